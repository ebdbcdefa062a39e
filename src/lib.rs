//! # spanwire
//!
//! An **incremental, callback-driven HTTP/1.x parser** with zero-copy spans,
//! usable both as a Rust library and as a CLI tool.
//!
//! Bytes are fed through [`Parser::execute`] in arbitrarily-sized pieces.
//! The parser reports each syntactic element through a [`Callbacks`] table as
//! soon as it is seen: token fragments arrive as [`Span`]s borrowed from the
//! caller's buffer, and every token is closed by its own `*_complete`
//! notification. Callbacks steer the parser by returning a [`Control`]:
//! continue, pause, skip the body, or abort.
//!
//! The grammar follows **RFC 9112**: requests and responses, fixed-length,
//! chunked (with extensions and trailers) and read-until-close bodies,
//! pipelining, keep-alive, protocol upgrades, `CONNECT` and the HTTP/2
//! connection preface. Leniency switches live in [`ParserConfig`].
//!
//! ## Quick start: one-shot parsing
//!
//! ```rust
//! use spanwire::parse_request;
//!
//! let raw = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let request = parse_request(raw).expect("valid request");
//! assert_eq!(request.method.as_str(), "GET");
//! assert_eq!(request.uri, "/hello");
//! ```
//!
//! ## Quick start: streaming with callbacks
//!
//! ```rust
//! use spanwire::{Callbacks, Context, Control, MessageMode, Parser, ParseStatus, Span};
//!
//! #[derive(Default)]
//! struct Body(Vec<u8>);
//!
//! fn on_body(cx: &mut Context<'_, Body>, span: Span<'_>) -> Control {
//!     cx.data.0.extend_from_slice(&span);
//!     Control::Continue
//! }
//!
//! let callbacks = Callbacks { on_body: Some(on_body), ..Callbacks::new() };
//! let mut parser = Parser::new(MessageMode::Response, &callbacks, Body::default());
//!
//! let status = parser.execute(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhel").unwrap();
//! assert_eq!(status, ParseStatus::Consumed(41));
//! parser.execute(b"lo").unwrap();
//!
//! assert_eq!(parser.data.0, b"hello");
//! assert_eq!(parser.messages_completed(), 1);
//! ```

mod callbacks;
mod collect;
mod error;
mod info;
mod output;
mod parser;
mod scan;
mod types;

// Re-export public API.
pub use callbacks::{Callbacks, Context, Control, DataFn, Event, NotifyFn, Span};
pub use collect::{EventRecorder, MessageCollector, RecordedEvent};
pub use error::{CALLBACK_CODE_BASE, ErrorKind, ParseError};
pub use info::MessageInfo;
pub use output::{format_debug, format_events, format_headers_only, format_json};
pub use parser::{ParseStatus, Parser, ParserConfig};
pub use types::{
    Header, HttpMessage, HttpRequest, HttpResponse, MessageKind, MessageMode, Method, Upgrade,
    Version,
};

/// Parse every message in `data` with custom [`ParserConfig`] settings.
///
/// The buffer is treated as the whole stream: a message cut short by the end
/// of `data` is an error. Bytes following a protocol upgrade are ignored.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed or a message is incomplete.
pub fn parse_messages_with_config(
    mode: MessageMode,
    data: &[u8],
    config: ParserConfig,
) -> Result<Vec<HttpMessage>, ParseError> {
    let mut parser = Parser::with_config(
        mode,
        config,
        &MessageCollector::CALLBACKS,
        MessageCollector::new(),
    );
    parser.execute(data)?;
    parser.finish()?;
    Ok(parser.into_data().into_messages())
}

/// Parse every message in `data` with the default configuration.
///
/// # Errors
///
/// See [`parse_messages_with_config`].
pub fn parse_messages(mode: MessageMode, data: &[u8]) -> Result<Vec<HttpMessage>, ParseError> {
    parse_messages_with_config(mode, data, ParserConfig::default())
}

fn no_message(data: &[u8]) -> ParseError {
    ParseError::new(
        ErrorKind::ClosedConnection,
        "input holds no complete message",
        data.len(),
    )
}

/// Parse the first request in `data` using custom [`ParserConfig`] settings.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, incomplete, or holds no
/// request.
pub fn parse_request_with_config(
    data: &[u8],
    config: ParserConfig,
) -> Result<HttpRequest, ParseError> {
    match parse_messages_with_config(MessageMode::Request, data, config)?
        .into_iter()
        .next()
    {
        Some(HttpMessage::Request(request)) => Ok(request),
        _ => Err(no_message(data)),
    }
}

/// Parse a **complete** HTTP request from a byte slice in one call.
///
/// This is a convenience wrapper around [`Parser`] and
/// [`MessageCollector`]. For streaming use-cases, create a `Parser` directly.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed or incomplete.
pub fn parse_request(data: &[u8]) -> Result<HttpRequest, ParseError> {
    parse_request_with_config(data, ParserConfig::default())
}

/// Parse the first response in `data` using custom [`ParserConfig`] settings.
///
/// A response without `Content-Length` or chunked framing takes the rest of
/// `data` as its body.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, incomplete, or holds no
/// response.
pub fn parse_response_with_config(
    data: &[u8],
    config: ParserConfig,
) -> Result<HttpResponse, ParseError> {
    match parse_messages_with_config(MessageMode::Response, data, config)?
        .into_iter()
        .next()
    {
        Some(HttpMessage::Response(response)) => Ok(response),
        _ => Err(no_message(data)),
    }
}

/// Parse a **complete** HTTP response from a byte slice in one call.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed or incomplete.
pub fn parse_response(data: &[u8]) -> Result<HttpResponse, ParseError> {
    parse_response_with_config(data, ParserConfig::default())
}
