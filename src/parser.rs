use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::callbacks::{Callbacks, Context, Control, Event, Span};
use crate::error::{ErrorKind, ParseError};
use crate::info::MessageInfo;
use crate::scan::{
    FramingHeader, NameMatcher, apply_connection, apply_transfer_encoding, hex_value,
    is_field_content_byte, is_ows, is_tchar, is_url_byte, parse_content_length,
};
use crate::types::{MessageKind, MessageMode, Method, Upgrade, Version};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Strictness switches and limits for the parser.
///
/// Everything defaults to strict RFC 9112 behaviour. Missing fields take their
/// default when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Accept a bare LF wherever CRLF is required (default: false).
    pub lenient_line_endings: bool,
    /// Accept obsolete header line folding (default: false). The continuation
    /// line is reported verbatim, leading whitespace included.
    pub allow_obs_fold: bool,
    /// Accept `Content-Length` alongside `Transfer-Encoding`; the latter wins
    /// (default: false).
    pub lenient_chunked_length: bool,
    /// Accept any single-digit `HTTP/x.y` version (default: false).
    pub lenient_version: bool,
    /// Keep parsing after a message that closes the connection (default: false).
    pub lenient_keep_alive: bool,
    /// Maximum bytes of start line plus header block, and of a trailer block;
    /// `0` disables the check (default: 80 KiB).
    pub max_head_size: usize,
    /// Maximum fields per header or trailer block; `0` disables the check
    /// (default: 128).
    pub max_headers_count: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            lenient_line_endings: false,
            allow_obs_fold: false,
            lenient_chunked_length: false,
            lenient_version: false,
            lenient_keep_alive: false,
            max_head_size: 80 * 1024,
            max_headers_count: 128,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse status
// ---------------------------------------------------------------------------

/// Outcome of a successful [`Parser::execute`] call.
///
/// Each variant carries the number of bytes consumed from the buffer. Bytes
/// past that count were not looked at and remain the caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The whole buffer was consumed; feed more data when it arrives.
    Consumed(usize),
    /// A callback (or [`Parser::pause`]) paused the parser. Re-deliver the
    /// remaining bytes after [`Parser::resume`].
    Paused(usize),
    /// The connection switched protocols; the remaining bytes belong to the
    /// new protocol.
    Upgraded(usize),
}

impl ParseStatus {
    pub fn consumed(&self) -> usize {
        match *self {
            Self::Consumed(n) | Self::Paused(n) | Self::Upgraded(n) => n,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    // ---- Between messages ----
    Start,
    /// `MessageMode::Both`: a leading `H` could open `HEAD` or `HTTP/`.
    StartH,

    // ---- Request line ----
    Method,
    UrlStart,
    Url,
    ReqVersion,
    ReqLineLf,

    // ---- Status line ----
    ResVersion,
    StatusCode,
    Reason,
    ResLineLf,

    // ---- Header (and trailer) section ----
    HeaderLineStart,
    HeaderField,
    HeaderValueOws,
    HeaderValue,
    HeaderValueLf,
    /// After a value's line ending: the next byte decides between obsolete
    /// folding and a new line.
    HeaderValueEnd,
    HeadersLf,

    // ---- Bodies ----
    BodyIdentity,
    BodyEof,

    // ---- Chunked transfer encoding ----
    ChunkSize,
    ChunkExtStart,
    ChunkExtName,
    ChunkExtValueStart,
    ChunkExtValue,
    ChunkExtQuoted,
    ChunkExtQuotedEscape,
    ChunkExtQuotedEnd,
    ChunkSizeLf,
    ChunkData,
    ChunkDataCr,
    ChunkDataLf,

    // ---- Terminal ----
    /// The previous message closed the connection.
    Closed,
    Upgraded,
}

impl State {
    /// States whose bytes belong to the active span token.
    fn collects(self) -> bool {
        matches!(
            self,
            Self::Method
                | Self::Url
                | Self::ReqVersion
                | Self::ResVersion
                | Self::Reason
                | Self::HeaderField
                | Self::HeaderValue
                | Self::ChunkExtName
                | Self::ChunkExtValue
                | Self::ChunkExtQuoted
                | Self::ChunkExtQuotedEscape
                | Self::ChunkExtQuotedEnd
        )
    }

    /// States whose bytes count against `max_head_size`.
    fn in_head(self) -> bool {
        matches!(
            self,
            Self::Method
                | Self::UrlStart
                | Self::Url
                | Self::ReqVersion
                | Self::ReqLineLf
                | Self::ResVersion
                | Self::StatusCode
                | Self::Reason
                | Self::ResLineLf
                | Self::HeaderLineStart
                | Self::HeaderField
                | Self::HeaderValueOws
                | Self::HeaderValue
                | Self::HeaderValueLf
                | Self::HeaderValueEnd
                | Self::HeadersLf
        )
    }
}

/// What the scanner does after handling one byte (or one body slice).
enum Step {
    /// Continue at this buffer index.
    Advance(usize),
    /// Handle the same byte again in the new state.
    Again,
    /// Return to the caller.
    Stop(ParseStatus),
}

/// Dispatch held back because an earlier callback paused the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Notify(Event),
    /// The `H` that opened a message in `MessageMode::Both`.
    LeadingH,
}

/// Validates `HTTP/<digit>.<digit>` one byte at a time.
#[derive(Debug, Clone, Copy, Default)]
struct VersionScanner {
    pos: u8,
    major: u8,
    minor: u8,
}

impl VersionScanner {
    const PREFIX: &'static [u8] = b"HTTP/";

    fn push(&mut self, b: u8) -> Result<(), (ErrorKind, &'static str)> {
        match self.pos {
            0..=4 if b == Self::PREFIX[usize::from(self.pos)] => {}
            0..=4 => return Err((ErrorKind::InvalidConstant, "expected HTTP/")),
            5 if b.is_ascii_digit() => self.major = b - b'0',
            6 if b == b'.' => {}
            7 if b.is_ascii_digit() => self.minor = b - b'0',
            5..=7 => return Err((ErrorKind::InvalidVersion, "malformed HTTP version")),
            _ => return Err((ErrorKind::InvalidVersion, "HTTP version too long")),
        }
        self.pos += 1;
        Ok(())
    }

    fn finish(&self) -> Result<Version, (ErrorKind, &'static str)> {
        if self.pos == 8 {
            Ok(Version::new(self.major, self.minor))
        } else {
            Err((ErrorKind::InvalidVersion, "truncated HTTP version"))
        }
    }
}

fn fail<R>(kind: ErrorKind, reason: impl Into<String>, at: usize) -> Result<R, ParseError> {
    Err(ParseError::new(kind, reason, at))
}

/// The `*_complete` notification closing a span token.
fn completion_of(event: Event) -> Option<Event> {
    match event {
        Event::Method => Some(Event::MethodComplete),
        Event::Url => Some(Event::UrlComplete),
        Event::Version => Some(Event::VersionComplete),
        Event::Status => Some(Event::StatusComplete),
        Event::HeaderField => Some(Event::HeaderFieldComplete),
        Event::HeaderValue => Some(Event::HeaderValueComplete),
        Event::ChunkExtensionName => Some(Event::ChunkExtensionNameComplete),
        Event::ChunkExtensionValue => Some(Event::ChunkExtensionValueComplete),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// An incremental, callback-driven HTTP/1.x parser.
///
/// Bytes go in through [`execute`](Self::execute); events come out through
/// the [`Callbacks`] table, synchronously and in byte order. Token payloads
/// are [`Span`]s borrowed from the buffer being executed, never copied.
///
/// `data` is the embedder's slot for per-connection state; callbacks reach it
/// as [`Context::data`].
///
/// # Usage
///
/// ```rust
/// use spanwire::{Callbacks, Context, Control, MessageMode, Parser, ParseStatus, Span};
///
/// fn on_url(cx: &mut Context<'_, Vec<u8>>, span: Span<'_>) -> Control {
///     cx.data.extend_from_slice(&span);
///     Control::Continue
/// }
///
/// let callbacks = Callbacks { on_url: Some(on_url), ..Callbacks::new() };
/// let mut parser = Parser::new(MessageMode::Request, &callbacks, Vec::new());
///
/// let status = parser.execute(b"GET /hello HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
/// assert!(matches!(status, ParseStatus::Consumed(_)));
/// assert_eq!(parser.data, b"/hello");
/// ```
pub struct Parser<'a, T> {
    callbacks: &'a Callbacks<T>,
    /// User data handed to every callback.
    pub data: T,
    config: ParserConfig,
    info: MessageInfo,
    state: State,
    error: Option<ParseError>,
    paused: bool,
    pause_requested: bool,
    deferred: VecDeque<Deferred>,
    /// A pause hid the upgrade from the `execute` call that reached it.
    upgrade_unreported: bool,
    /// Message kind fixed by the first message in `MessageMode::Both`.
    locked_kind: Option<MessageKind>,

    // Span tracking
    active: Option<Event>,
    mark: Option<usize>,

    // Token scratch
    method_buf: [u8; Method::MAX_LEN],
    method_len: usize,
    version: VersionScanner,
    status_digits: u8,
    name_matcher: NameMatcher,
    framing: Option<FramingHeader>,
    framing_value: Vec<u8>,

    // Bookkeeping
    head_bytes: usize,
    body_remaining: u64,
    chunk_digits: u8,
    bytes_consumed: usize,
    messages_completed: usize,
}

impl<'a, T> Parser<'a, T> {
    /// Create a parser with the default (strict) configuration.
    pub fn new(mode: MessageMode, callbacks: &'a Callbacks<T>, data: T) -> Self {
        Self::with_config(mode, ParserConfig::default(), callbacks, data)
    }

    pub fn with_config(
        mode: MessageMode,
        config: ParserConfig,
        callbacks: &'a Callbacks<T>,
        data: T,
    ) -> Self {
        Self {
            callbacks,
            data,
            config,
            info: MessageInfo::new(mode),
            state: State::Start,
            error: None,
            paused: false,
            pause_requested: false,
            deferred: VecDeque::new(),
            upgrade_unreported: false,
            locked_kind: None,
            active: None,
            mark: None,
            method_buf: [0; Method::MAX_LEN],
            method_len: 0,
            version: VersionScanner::default(),
            status_digits: 0,
            name_matcher: NameMatcher::default(),
            framing: None,
            framing_value: Vec::new(),
            head_bytes: 0,
            body_remaining: 0,
            chunk_digits: 0,
            bytes_consumed: 0,
            messages_completed: 0,
        }
    }

    /// Return to the initial state, keeping mode, configuration, callbacks
    /// and user data.
    pub fn reset(&mut self) {
        let mode = self.info.mode();
        self.info = MessageInfo::new(mode);
        self.state = State::Start;
        self.error = None;
        self.paused = false;
        self.pause_requested = false;
        self.deferred.clear();
        self.upgrade_unreported = false;
        self.locked_kind = None;
        self.active = None;
        self.mark = None;
        self.method_len = 0;
        self.version = VersionScanner::default();
        self.status_digits = 0;
        self.name_matcher.clear();
        self.framing = None;
        self.framing_value.clear();
        self.head_bytes = 0;
        self.body_remaining = 0;
        self.chunk_digits = 0;
        self.bytes_consumed = 0;
        self.messages_completed = 0;
        tracing::debug!(?mode, "parser reset");
    }

    /// Feed the next bytes of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] on any protocol violation or callback abort. The
    /// parser then stays failed, returning the same error, until
    /// [`reset`](Self::reset). Calling `execute` while paused or after an
    /// upgrade fails with a `Paused*` kind without poisoning the parser.
    pub fn execute(&mut self, data: &[u8]) -> Result<ParseStatus, ParseError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.paused {
            return fail(
                ErrorKind::Paused,
                "execute called while paused; call resume first",
                0,
            );
        }
        if self.state == State::Upgraded && !self.upgrade_unreported {
            let kind = match self.info.upgrade() {
                Some(Upgrade::H2Preface) => ErrorKind::PausedH2Upgrade,
                _ => ErrorKind::PausedUpgrade,
            };
            return fail(kind, "connection switched protocols", 0);
        }
        if self.pause_requested {
            self.pause_requested = false;
            self.paused = true;
            return Ok(ParseStatus::Paused(0));
        }

        match self.run(data) {
            Ok(status) => {
                self.bytes_consumed += status.consumed();
                Ok(status)
            }
            Err(error) => {
                tracing::debug!(
                    kind = %error.kind(),
                    offset = error.offset(),
                    reason = error.reason(),
                    "parse error"
                );
                self.bytes_consumed += error.offset();
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Signal the end of the stream.
    ///
    /// Completes a body that is delimited by connection close. Succeeds when
    /// the parser sits between messages, after an upgrade, or after such a
    /// body; anything else means the peer closed mid-message.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ClosedConnection`] when a message is unfinished, or the
    /// stored error if the parser already failed.
    pub fn finish(&mut self) -> Result<(), ParseError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.paused || self.pause_requested {
            return fail(
                ErrorKind::Paused,
                "finish called while paused; call resume first",
                0,
            );
        }
        let result = match self.drain_deferred() {
            Ok(true) => {
                return fail(ErrorKind::Paused, "a held-back callback paused the parser", 0);
            }
            Ok(false) => match self.state {
                State::Start | State::Closed | State::Upgraded => Ok(()),
                State::BodyEof => self.message_complete(0).map(|_| ()),
                _ => fail(
                    ErrorKind::ClosedConnection,
                    "stream ended before the message was complete",
                    0,
                ),
            },
            Err(error) => Err(error),
        };
        if self.pause_requested {
            self.pause_requested = false;
            self.paused = true;
        }
        if let Err(error) = &result {
            self.error = Some(error.clone());
        }
        result
    }

    /// Ask the parser to pause. Takes effect at the start of the next
    /// [`execute`](Self::execute) call.
    pub fn pause(&mut self) {
        self.pause_requested = true;
    }

    /// Clear the paused state; the next `execute` continues where parsing
    /// stopped.
    pub fn resume(&mut self) {
        self.paused = false;
        self.pause_requested = false;
    }

    /// Keep parsing HTTP after an upgrade the embedder declined.
    pub fn resume_after_upgrade(&mut self) {
        if self.state == State::Upgraded {
            self.state = State::Start;
            self.upgrade_unreported = false;
            self.resume();
        }
    }

    /// Fail the parser from outside the callbacks, e.g. on a transport
    /// policy violation. Subsequent calls return [`ErrorKind::User`].
    pub fn abort(&mut self, reason: impl Into<String>) {
        let error = ParseError::new(ErrorKind::User, reason, 0);
        tracing::debug!(reason = error.reason(), "parser aborted");
        self.error = Some(error);
    }

    // ----- queries --------------------------------------------------------

    pub fn info(&self) -> &MessageInfo {
        &self.info
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn mode(&self) -> MessageMode {
        self.info.mode()
    }

    pub fn kind(&self) -> Option<MessageKind> {
        self.info.kind()
    }

    pub fn http_major(&self) -> u8 {
        self.info.http_major()
    }

    pub fn http_minor(&self) -> u8 {
        self.info.http_minor()
    }

    pub fn version(&self) -> Option<Version> {
        self.info.version()
    }

    pub fn method(&self) -> Option<Method> {
        self.info.method()
    }

    pub fn status_code(&self) -> u16 {
        self.info.status_code()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.info.content_length()
    }

    pub fn is_chunked(&self) -> bool {
        self.info.is_chunked()
    }

    pub fn upgrade(&self) -> Option<Upgrade> {
        self.info.upgrade()
    }

    /// `true` once the parser stopped for a protocol switch.
    pub fn is_upgrade(&self) -> bool {
        self.state == State::Upgraded
    }

    pub fn should_keep_alive(&self) -> bool {
        self.info.should_keep_alive()
    }

    pub fn needs_eof(&self) -> bool {
        self.info.needs_eof()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The error that stopped the parser, if any.
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Total bytes consumed since creation or the last reset.
    pub fn bytes_consumed(&self) -> usize {
        self.bytes_consumed
    }

    /// Messages completed since creation or the last reset.
    pub fn messages_completed(&self) -> usize {
        self.messages_completed
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    // ----- event dispatch -------------------------------------------------

    fn invoke(
        &mut self,
        event: Event,
        span: Option<Span<'_>>,
        at: usize,
    ) -> Result<Control, ParseError> {
        let control = match span {
            Some(span) => match self.callbacks.data_slot(event) {
                Some(callback) => callback(&mut Context::new(&self.info, &mut self.data), span),
                None => Control::Continue,
            },
            None => match self.callbacks.notify_slot(event) {
                Some(callback) => callback(&mut Context::new(&self.info, &mut self.data)),
                None => Control::Continue,
            },
        };
        match control {
            Control::Continue | Control::SkipBody => Ok(control),
            Control::Pause => {
                self.pause_requested = true;
                Ok(control)
            }
            Control::Error => fail(
                ErrorKind::Callback(event),
                format!("on_{event} callback returned an error"),
                at,
            ),
        }
    }

    /// Fire a notification, or hold it back while a pause is pending.
    fn notify(&mut self, event: Event, at: usize) -> Result<(), ParseError> {
        if self.pause_requested {
            self.deferred.push_back(Deferred::Notify(event));
            return Ok(());
        }
        match self.invoke(event, None, at)? {
            Control::SkipBody => fail(
                ErrorKind::Callback(event),
                "skip-body is only valid from on_headers_complete",
                at,
            ),
            _ => Ok(()),
        }
    }

    fn emit(&mut self, event: Event, span: Span<'_>) -> Result<(), ParseError> {
        if span.is_empty() {
            return Ok(());
        }
        let at = span.offset();
        match self.invoke(event, Some(span), at)? {
            Control::SkipBody => fail(
                ErrorKind::Callback(event),
                "skip-body is only valid from on_headers_complete",
                at,
            ),
            _ => Ok(()),
        }
    }

    // ----- span tracking --------------------------------------------------

    fn begin_token(&mut self, event: Event, at: usize) {
        self.active = Some(event);
        self.mark = Some(at);
    }

    /// Report the pending fragment of the active token, keeping it open.
    fn flush(&mut self, data: &[u8], end: usize) -> Result<(), ParseError> {
        if let (Some(event), Some(start)) = (self.active, self.mark.take()) {
            self.emit(event, Span::new(&data[start..end], start))?;
        }
        Ok(())
    }

    /// Report the last fragment of the active token and its completion.
    fn end_token(&mut self, data: &[u8], end: usize) -> Result<(), ParseError> {
        self.flush(data, end)?;
        if let Some(complete) = self.active.take().and_then(completion_of) {
            self.notify(complete, end)?;
        }
        Ok(())
    }

    // ----- main loop ------------------------------------------------------

    /// Dispatch everything held back by the last pause. Returns `true` when
    /// one of those callbacks paused again.
    fn drain_deferred(&mut self) -> Result<bool, ParseError> {
        while let Some(deferred) = self.deferred.pop_front() {
            match deferred {
                Deferred::Notify(event) => self.notify(event, 0)?,
                Deferred::LeadingH => {
                    if let Some(event) = self.active {
                        self.emit(event, Span::new(b"H", 0))?;
                    }
                }
            }
            if self.pause_requested {
                self.pause_requested = false;
                self.paused = true;
                tracing::debug!(held = self.deferred.len(), "parser paused");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn run(&mut self, data: &[u8]) -> Result<ParseStatus, ParseError> {
        if self.drain_deferred()? {
            return Ok(ParseStatus::Paused(0));
        }
        if self.state == State::Upgraded {
            self.upgrade_unreported = false;
            return Ok(ParseStatus::Upgraded(0));
        }

        self.mark = (self.active.is_some() && self.state.collects()).then_some(0);
        let mut i = 0;

        while i < data.len() {
            let counted = self.state.in_head();
            match self.step(data, i)? {
                // The byte at `i` is handled again after resume.
                Step::Again if self.pause_requested => return self.stop_paused(data, i),
                Step::Again => continue,
                Step::Stop(status) => return Ok(status),
                Step::Advance(next) => {
                    if counted {
                        self.head_bytes += next - i;
                        self.check_head_size(i)?;
                    }
                    i = next;
                }
            }
            if self.pause_requested {
                return self.stop_paused(data, i);
            }
        }

        self.flush(data, data.len())?;
        if self.pause_requested {
            return self.stop_paused(data, data.len());
        }
        Ok(ParseStatus::Consumed(data.len()))
    }

    fn stop_paused(&mut self, data: &[u8], at: usize) -> Result<ParseStatus, ParseError> {
        self.flush(data, at)?;
        self.pause_requested = false;
        self.paused = true;
        tracing::debug!(at, state = ?self.state, "parser paused");
        Ok(ParseStatus::Paused(at))
    }

    fn check_head_size(&self, at: usize) -> Result<(), ParseError> {
        let limit = self.config.max_head_size;
        if limit != 0 && self.head_bytes > limit {
            return fail(
                ErrorKind::HeaderOverflow,
                format!("header section exceeds {limit} bytes"),
                at,
            );
        }
        Ok(())
    }

    /// Whether a bare LF is acceptable here, or the matching error.
    fn bare_lf(&self, at: usize) -> Result<(), ParseError> {
        if self.config.lenient_line_endings {
            Ok(())
        } else {
            fail(ErrorKind::CrExpected, "bare LF without CR", at)
        }
    }

    fn step(&mut self, data: &[u8], i: usize) -> Result<Step, ParseError> {
        let b = data[i];
        let next = i + 1;

        match self.state {
            // ===================== BETWEEN MESSAGES =====================
            State::Start => {
                if b == b'\r' || b == b'\n' {
                    return Ok(Step::Advance(next));
                }
                match self.info.mode() {
                    MessageMode::Request => self.start_request(i)?,
                    MessageMode::Response => self.start_response(i)?,
                    MessageMode::Both if b == b'H' => {
                        self.state = State::StartH;
                        // Remember where the H sits while it is in this buffer.
                        self.mark = Some(i);
                        return Ok(Step::Advance(next));
                    }
                    MessageMode::Both => self.start_request(i)?,
                }
                Ok(Step::Again)
            }

            State::StartH => {
                let h_at = self.mark.take();
                if b == b'T' {
                    self.start_response(i)?;
                    self.version.pos = 1;
                } else {
                    self.start_request(i)?;
                    self.method_buf[0] = b'H';
                    self.method_len = 1;
                }
                if self.pause_requested {
                    self.mark = None;
                    self.deferred.push_back(Deferred::LeadingH);
                } else if let Some(h) = h_at {
                    self.mark = Some(h);
                } else if let Some(event) = self.active {
                    // The H ended the previous buffer.
                    self.emit(event, Span::new(b"H", 0))?;
                }
                Ok(Step::Again)
            }

            State::Closed => {
                if b == b'\r' || b == b'\n' {
                    return Ok(Step::Advance(next));
                }
                if self.config.lenient_keep_alive {
                    self.state = State::Start;
                    return Ok(Step::Again);
                }
                fail(
                    ErrorKind::ClosedConnection,
                    "data after the connection was closed",
                    i,
                )
            }

            State::Upgraded => fail(ErrorKind::Internal, "scanner ran after upgrade", i),

            // ===================== REQUEST LINE =====================
            State::Method => {
                if b == b' ' {
                    let token = &self.method_buf[..self.method_len];
                    let method = Method::from_bytes(token).ok_or_else(|| {
                        ParseError::new(
                            ErrorKind::InvalidMethod,
                            format!("unknown method '{}'", String::from_utf8_lossy(token)),
                            i,
                        )
                    })?;
                    self.info.method = Some(method);
                    self.end_token(data, i)?;
                    self.state = State::UrlStart;
                } else if is_tchar(b) {
                    if self.method_len >= Method::MAX_LEN {
                        return fail(ErrorKind::InvalidMethod, "method too long", i);
                    }
                    self.method_buf[self.method_len] = b;
                    self.method_len += 1;
                } else {
                    return fail(
                        ErrorKind::InvalidMethod,
                        format!("unexpected byte 0x{b:02X} in method"),
                        i,
                    );
                }
                Ok(Step::Advance(next))
            }

            State::UrlStart => {
                if is_url_byte(b) {
                    self.begin_token(Event::Url, i);
                    self.state = State::Url;
                    Ok(Step::Advance(next))
                } else if b == b' ' {
                    fail(ErrorKind::InvalidUrl, "empty request target", i)
                } else {
                    fail(
                        ErrorKind::InvalidUrl,
                        format!("unexpected byte 0x{b:02X} in request target"),
                        i,
                    )
                }
            }

            State::Url => {
                if b == b' ' {
                    self.end_token(data, i)?;
                    self.version = VersionScanner::default();
                    self.begin_token(Event::Version, next);
                    self.state = State::ReqVersion;
                } else if b == b'\r' || b == b'\n' {
                    return fail(ErrorKind::InvalidVersion, "missing HTTP version", i);
                } else if !is_url_byte(b) {
                    return fail(
                        ErrorKind::InvalidUrl,
                        format!("unexpected byte 0x{b:02X} in request target"),
                        i,
                    );
                }
                Ok(Step::Advance(next))
            }

            State::ReqVersion => match b {
                b'\r' => {
                    self.finish_version(data, i)?;
                    self.state = State::ReqLineLf;
                    Ok(Step::Advance(next))
                }
                b'\n' => {
                    self.bare_lf(i)?;
                    self.finish_version(data, i)?;
                    self.after_request_line(next)
                }
                _ => {
                    self.push_version(b, i)?;
                    Ok(Step::Advance(next))
                }
            },

            State::ReqLineLf => {
                if b != b'\n' {
                    return fail(ErrorKind::LfExpected, "expected LF after request line", i);
                }
                self.after_request_line(next)
            }

            // ===================== STATUS LINE =====================
            State::ResVersion => {
                match b {
                    b' ' => {
                        self.finish_version(data, i)?;
                        self.info.status_code = 0;
                        self.status_digits = 0;
                        self.state = State::StatusCode;
                    }
                    b'\r' | b'\n' => {
                        return fail(ErrorKind::InvalidStatus, "missing status code", i);
                    }
                    _ => self.push_version(b, i)?,
                }
                Ok(Step::Advance(next))
            }

            State::StatusCode => match b {
                b'0'..=b'9' if self.status_digits < 3 => {
                    self.info.status_code = self.info.status_code * 10 + u16::from(b - b'0');
                    self.status_digits += 1;
                    Ok(Step::Advance(next))
                }
                b' ' if self.status_digits == 3 => {
                    self.begin_token(Event::Status, next);
                    self.state = State::Reason;
                    Ok(Step::Advance(next))
                }
                b'\r' if self.status_digits == 3 => {
                    // No reason phrase at all.
                    self.active = Some(Event::Status);
                    self.end_token(data, i)?;
                    self.state = State::ResLineLf;
                    Ok(Step::Advance(next))
                }
                b'\n' if self.status_digits == 3 => {
                    self.bare_lf(i)?;
                    self.active = Some(Event::Status);
                    self.end_token(data, i)?;
                    self.after_status_line(next)
                }
                _ => fail(
                    ErrorKind::InvalidStatus,
                    "status code must be exactly three digits",
                    i,
                ),
            },

            State::Reason => match b {
                b'\r' => {
                    self.end_token(data, i)?;
                    self.state = State::ResLineLf;
                    Ok(Step::Advance(next))
                }
                b'\n' => {
                    self.bare_lf(i)?;
                    self.end_token(data, i)?;
                    self.after_status_line(next)
                }
                _ if is_field_content_byte(b) => Ok(Step::Advance(next)),
                _ => fail(
                    ErrorKind::InvalidStatus,
                    format!("unexpected byte 0x{b:02X} in reason phrase"),
                    i,
                ),
            },

            State::ResLineLf => {
                if b != b'\n' {
                    return fail(ErrorKind::LfExpected, "expected LF after status line", i);
                }
                self.after_status_line(next)
            }

            // ===================== HEADERS =====================
            State::HeaderLineStart => match b {
                b'\r' => {
                    self.state = State::HeadersLf;
                    Ok(Step::Advance(next))
                }
                b'\n' => {
                    self.bare_lf(i)?;
                    self.end_of_header_block(i)
                }
                _ if is_tchar(b) => {
                    self.info.header_count += 1;
                    let limit = self.config.max_headers_count;
                    if limit != 0 && self.info.header_count > limit {
                        return fail(
                            ErrorKind::HeaderOverflow,
                            format!("more than {limit} header fields"),
                            i,
                        );
                    }
                    self.name_matcher.clear();
                    self.name_matcher.push(b);
                    self.begin_token(Event::HeaderField, i);
                    self.state = State::HeaderField;
                    Ok(Step::Advance(next))
                }
                b' ' | b'\t' => fail(
                    ErrorKind::InvalidHeaderToken,
                    "unexpected whitespace at start of header line",
                    i,
                ),
                _ => fail(
                    ErrorKind::InvalidHeaderToken,
                    format!("unexpected byte 0x{b:02X} at start of header line"),
                    i,
                ),
            },

            State::HeaderField => {
                if b == b':' {
                    self.end_token(data, i)?;
                    self.framing = if self.info.in_trailer {
                        None
                    } else {
                        self.name_matcher.finish()
                    };
                    self.framing_value.clear();
                    self.active = Some(Event::HeaderValue);
                    self.state = State::HeaderValueOws;
                } else if is_tchar(b) {
                    self.name_matcher.push(b);
                } else {
                    return fail(
                        ErrorKind::InvalidHeaderToken,
                        format!("unexpected byte 0x{b:02X} in header name"),
                        i,
                    );
                }
                Ok(Step::Advance(next))
            }

            State::HeaderValueOws => {
                match b {
                    b' ' | b'\t' => {}
                    b'\r' => self.state = State::HeaderValueLf,
                    b'\n' => {
                        self.bare_lf(i)?;
                        self.state = State::HeaderValueEnd;
                    }
                    _ if is_field_content_byte(b) => {
                        self.mark = Some(i);
                        self.collect_value(b);
                        self.state = State::HeaderValue;
                    }
                    _ => {
                        return fail(
                            ErrorKind::InvalidHeaderToken,
                            format!("unexpected byte 0x{b:02X} in header value"),
                            i,
                        );
                    }
                }
                Ok(Step::Advance(next))
            }

            State::HeaderValue => {
                match b {
                    b'\r' => {
                        self.flush(data, i)?;
                        self.state = State::HeaderValueLf;
                    }
                    b'\n' => {
                        self.bare_lf(i)?;
                        self.flush(data, i)?;
                        self.state = State::HeaderValueEnd;
                    }
                    _ if is_field_content_byte(b) => self.collect_value(b),
                    _ => {
                        return fail(
                            ErrorKind::InvalidHeaderToken,
                            format!("unexpected byte 0x{b:02X} in header value"),
                            i,
                        );
                    }
                }
                Ok(Step::Advance(next))
            }

            State::HeaderValueLf => {
                if b != b'\n' {
                    return fail(ErrorKind::LfExpected, "expected LF after header value", i);
                }
                self.state = State::HeaderValueEnd;
                Ok(Step::Advance(next))
            }

            State::HeaderValueEnd => {
                if is_ows(b) {
                    if !self.config.allow_obs_fold {
                        return fail(ErrorKind::Strict, "obsolete line folding", i);
                    }
                    self.mark = Some(i);
                    self.collect_value(b);
                    self.state = State::HeaderValue;
                    return Ok(Step::Advance(next));
                }
                self.end_token(data, i)?;
                self.apply_framing_header(i)?;
                self.state = State::HeaderLineStart;
                Ok(Step::Again)
            }

            State::HeadersLf => {
                if b != b'\n' {
                    return fail(ErrorKind::LfExpected, "expected LF after header block", i);
                }
                self.end_of_header_block(i)
            }

            // ===================== BODIES =====================
            State::BodyIdentity => {
                let available = (data.len() - i) as u64;
                let take = available.min(self.body_remaining) as usize;
                let end = i + take;
                self.emit(Event::Body, Span::new(&data[i..end], i))?;
                self.body_remaining -= take as u64;
                if self.body_remaining == 0 {
                    return self.message_complete(end);
                }
                Ok(Step::Advance(end))
            }

            State::BodyEof => {
                self.emit(Event::Body, Span::new(&data[i..], i))?;
                Ok(Step::Advance(data.len()))
            }

            // ===================== CHUNKED ENCODING =====================
            State::ChunkSize => match (hex_value(b), b) {
                (Some(digit), _) => {
                    self.info.chunk_size = self
                        .info
                        .chunk_size
                        .checked_mul(16)
                        .and_then(|n| n.checked_add(u64::from(digit)))
                        .ok_or_else(|| {
                            ParseError::new(
                                ErrorKind::InvalidChunkSize,
                                "chunk size overflows 64 bits",
                                i,
                            )
                        })?;
                    self.chunk_digits = self.chunk_digits.saturating_add(1);
                    Ok(Step::Advance(next))
                }
                _ if self.chunk_digits == 0 => {
                    fail(ErrorKind::InvalidChunkSize, "missing chunk size", i)
                }
                (None, b';') => {
                    self.state = State::ChunkExtStart;
                    Ok(Step::Advance(next))
                }
                (None, b'\r') => {
                    self.state = State::ChunkSizeLf;
                    Ok(Step::Advance(next))
                }
                (None, b'\n') => {
                    self.bare_lf(i)?;
                    self.chunk_header(next)
                }
                _ => fail(
                    ErrorKind::InvalidChunkSize,
                    format!("unexpected byte 0x{b:02X} in chunk size"),
                    i,
                ),
            },

            State::ChunkExtStart => {
                if is_ows(b) {
                    return Ok(Step::Advance(next));
                }
                if !is_tchar(b) {
                    return fail(ErrorKind::InvalidChunkSize, "invalid chunk extension name", i);
                }
                self.begin_token(Event::ChunkExtensionName, i);
                self.state = State::ChunkExtName;
                Ok(Step::Advance(next))
            }

            State::ChunkExtName => match b {
                _ if is_tchar(b) => Ok(Step::Advance(next)),
                b'=' => {
                    self.end_token(data, i)?;
                    self.state = State::ChunkExtValueStart;
                    Ok(Step::Advance(next))
                }
                _ => self.end_chunk_extension(data, b, i),
            },

            State::ChunkExtValueStart => {
                if b == b'"' {
                    self.state = State::ChunkExtQuoted;
                } else if is_tchar(b) {
                    self.state = State::ChunkExtValue;
                } else {
                    return fail(ErrorKind::InvalidChunkSize, "invalid chunk extension value", i);
                }
                self.begin_token(Event::ChunkExtensionValue, i);
                Ok(Step::Advance(next))
            }

            State::ChunkExtValue => {
                if is_tchar(b) {
                    return Ok(Step::Advance(next));
                }
                self.end_chunk_extension(data, b, i)
            }

            State::ChunkExtQuoted => {
                match b {
                    b'"' => self.state = State::ChunkExtQuotedEnd,
                    b'\\' => self.state = State::ChunkExtQuotedEscape,
                    _ if is_field_content_byte(b) => {}
                    _ => {
                        return fail(
                            ErrorKind::InvalidChunkSize,
                            "invalid byte in quoted chunk extension",
                            i,
                        );
                    }
                }
                Ok(Step::Advance(next))
            }

            State::ChunkExtQuotedEscape => {
                if !is_field_content_byte(b) {
                    return fail(
                        ErrorKind::InvalidChunkSize,
                        "invalid escape in quoted chunk extension",
                        i,
                    );
                }
                self.state = State::ChunkExtQuoted;
                Ok(Step::Advance(next))
            }

            State::ChunkExtQuotedEnd => self.end_chunk_extension(data, b, i),

            State::ChunkSizeLf => {
                if b != b'\n' {
                    return fail(ErrorKind::LfExpected, "expected LF after chunk size", i);
                }
                self.chunk_header(next)
            }

            State::ChunkData => {
                let available = (data.len() - i) as u64;
                let take = available.min(self.body_remaining) as usize;
                let end = i + take;
                self.emit(Event::Body, Span::new(&data[i..end], i))?;
                self.body_remaining -= take as u64;
                if self.body_remaining == 0 {
                    self.state = State::ChunkDataCr;
                }
                Ok(Step::Advance(end))
            }

            State::ChunkDataCr => match b {
                b'\r' => {
                    self.state = State::ChunkDataLf;
                    Ok(Step::Advance(next))
                }
                b'\n' => {
                    self.bare_lf(i)?;
                    self.chunk_complete(next)
                }
                _ => fail(
                    ErrorKind::InvalidChunkSize,
                    "chunk data longer than its declared size",
                    i,
                ),
            },

            State::ChunkDataLf => {
                if b != b'\n' {
                    return fail(ErrorKind::LfExpected, "expected LF after chunk data", i);
                }
                self.chunk_complete(next)
            }
        }
    }

    // ----- transitions ----------------------------------------------------

    fn begin_message(&mut self, kind: MessageKind, at: usize) -> Result<(), ParseError> {
        if self.info.mode() == MessageMode::Both {
            match self.locked_kind {
                Some(locked) if locked != kind => {
                    return fail(
                        ErrorKind::SiblingMessageInProgress,
                        format!("{kind:?} arrived on a {locked:?} connection"),
                        at,
                    );
                }
                _ => self.locked_kind = Some(kind),
            }
        }
        if self.messages_completed > 0 {
            self.notify(Event::Reset, at)?;
        }

        self.info.clear_message();
        self.info.kind = Some(kind);
        self.method_len = 0;
        self.version = VersionScanner::default();
        self.status_digits = 0;
        self.framing = None;
        self.framing_value.clear();
        self.head_bytes = 0;
        self.body_remaining = 0;
        self.chunk_digits = 0;

        tracing::debug!(?kind, at, "message begin");
        self.notify(Event::MessageBegin, at)
    }

    fn start_request(&mut self, at: usize) -> Result<(), ParseError> {
        self.begin_message(MessageKind::Request, at)?;
        self.begin_token(Event::Method, at);
        self.state = State::Method;
        Ok(())
    }

    fn start_response(&mut self, at: usize) -> Result<(), ParseError> {
        self.begin_message(MessageKind::Response, at)?;
        self.begin_token(Event::Version, at);
        self.state = State::ResVersion;
        Ok(())
    }

    fn push_version(&mut self, b: u8, at: usize) -> Result<(), ParseError> {
        self.version
            .push(b)
            .or_else(|(kind, reason)| fail(kind, reason, at))
    }

    fn finish_version(&mut self, data: &[u8], at: usize) -> Result<(), ParseError> {
        let version = self
            .version
            .finish()
            .or_else(|(kind, reason)| fail(kind, reason, at))?;
        let supported = match (version.major, version.minor) {
            (1, 0) | (1, 1) => true,
            (2, 0) => self.info.kind == Some(MessageKind::Request),
            _ => false,
        };
        if !supported && !self.config.lenient_version {
            return fail(
                ErrorKind::InvalidVersion,
                format!("unsupported version {version}"),
                at,
            );
        }
        self.info.version = Some(version);
        self.end_token(data, at)
    }

    fn after_request_line(&mut self, next: usize) -> Result<Step, ParseError> {
        let at = next - 1;
        let is_pri = self.info.method == Some(Method::PRI);
        let is_h2 = self.info.version == Some(Version::HTTP_20);
        if is_pri && is_h2 {
            self.info.upgrade = Some(Upgrade::H2Preface);
            self.state = State::Upgraded;
            tracing::debug!(at, "HTTP/2 connection preface");
            return Ok(self.upgraded(next));
        }
        if is_pri {
            return fail(
                ErrorKind::InvalidMethod,
                "PRI is only valid in the HTTP/2 preface",
                at,
            );
        }
        if is_h2 && !self.config.lenient_version {
            return fail(
                ErrorKind::InvalidVersion,
                "HTTP/2.0 request line outside the connection preface",
                at,
            );
        }
        self.state = State::HeaderLineStart;
        Ok(Step::Advance(next))
    }

    fn after_status_line(&mut self, next: usize) -> Result<Step, ParseError> {
        self.state = State::HeaderLineStart;
        Ok(Step::Advance(next))
    }

    fn collect_value(&mut self, b: u8) {
        if self.framing.is_some() {
            self.framing_value.push(b);
        }
    }

    fn apply_framing_header(&mut self, at: usize) -> Result<(), ParseError> {
        let Some(header) = self.framing.take() else {
            return Ok(());
        };
        let value = std::mem::take(&mut self.framing_value);
        let flags = &mut self.info.flags;
        match header {
            FramingHeader::ContentLength => {
                let length = parse_content_length(&value)
                    .or_else(|reason| fail(ErrorKind::InvalidContentLength, reason, at))?;
                if flags.content_length && self.info.content_length != Some(length) {
                    return fail(
                        ErrorKind::InvalidContentLength,
                        "multiple differing Content-Length values",
                        at,
                    );
                }
                flags.content_length = true;
                self.info.content_length = Some(length);
            }
            FramingHeader::TransferEncoding => apply_transfer_encoding(&value, flags),
            FramingHeader::Connection => apply_connection(&value, flags),
            FramingHeader::Upgrade => flags.upgrade = true,
        }
        self.framing_value = value;
        self.framing_value.clear();
        Ok(())
    }

    fn end_of_header_block(&mut self, at: usize) -> Result<Step, ParseError> {
        let next = at + 1;
        if self.info.in_trailer {
            self.info.in_trailer = false;
            self.notify(Event::ChunkComplete, at)?;
            return self.message_complete(next);
        }

        let flags = self.info.flags;
        if flags.content_length && flags.transfer_encoding {
            if !self.config.lenient_chunked_length {
                return fail(
                    ErrorKind::UnexpectedContentLength,
                    "Content-Length can't be present with Transfer-Encoding",
                    at,
                );
            }
            self.info.content_length = None;
        }

        match self.info.kind {
            Some(MessageKind::Request) => {
                if flags.transfer_encoding && !flags.chunked {
                    return fail(
                        ErrorKind::InvalidTransferEncoding,
                        "request Transfer-Encoding must end with chunked",
                        at,
                    );
                }
                if self.info.method == Some(Method::CONNECT) {
                    self.info.upgrade = Some(Upgrade::Connect);
                    self.info.skip_body = true;
                } else if flags.upgrade && flags.connection_upgrade {
                    self.info.upgrade = Some(Upgrade::Protocol);
                }
            }
            Some(MessageKind::Response) => {
                if self.info.status_code == 101 {
                    self.info.upgrade = Some(Upgrade::Protocol);
                }
            }
            None => {
                return fail(
                    ErrorKind::Internal,
                    "header block ended before the message kind was known",
                    at,
                );
            }
        }

        self.info.headers_complete = true;
        tracing::debug!(
            headers = self.info.header_count,
            content_length = ?self.info.content_length(),
            chunked = flags.chunked,
            upgrade = ?self.info.upgrade,
            "headers complete"
        );
        if self.invoke(Event::HeadersComplete, None, at)? == Control::SkipBody {
            self.info.skip_body = true;
        }

        if !self.info.has_body() {
            return self.message_complete(next);
        }
        if self.info.flags.chunked {
            self.info.chunk_size = 0;
            self.chunk_digits = 0;
            self.state = State::ChunkSize;
        } else if let Some(length) = self.info.content_length.filter(|n| *n > 0) {
            self.body_remaining = length;
            self.state = State::BodyIdentity;
        } else {
            self.state = State::BodyEof;
        }
        Ok(Step::Advance(next))
    }

    /// Close a chunk extension on `b`, the first byte after its name or value.
    fn end_chunk_extension(&mut self, data: &[u8], b: u8, at: usize) -> Result<Step, ParseError> {
        match b {
            b';' => {
                self.end_token(data, at)?;
                self.state = State::ChunkExtStart;
                Ok(Step::Advance(at + 1))
            }
            b'\r' => {
                self.end_token(data, at)?;
                self.state = State::ChunkSizeLf;
                Ok(Step::Advance(at + 1))
            }
            b'\n' => {
                self.bare_lf(at)?;
                self.end_token(data, at)?;
                self.chunk_header(at + 1)
            }
            _ => fail(
                ErrorKind::InvalidChunkSize,
                format!("unexpected byte 0x{b:02X} in chunk extension"),
                at,
            ),
        }
    }

    fn chunk_header(&mut self, next: usize) -> Result<Step, ParseError> {
        let size = self.info.chunk_size;
        tracing::trace!(size, "chunk header");
        self.notify(Event::ChunkHeader, next - 1)?;
        self.chunk_digits = 0;
        if size == 0 {
            self.info.in_trailer = true;
            self.info.header_count = 0;
            self.head_bytes = 0;
            self.state = State::HeaderLineStart;
        } else {
            self.body_remaining = size;
            self.state = State::ChunkData;
        }
        Ok(Step::Advance(next))
    }

    fn chunk_complete(&mut self, next: usize) -> Result<Step, ParseError> {
        self.notify(Event::ChunkComplete, next - 1)?;
        self.info.chunk_size = 0;
        self.state = State::ChunkSize;
        Ok(Step::Advance(next))
    }

    fn message_complete(&mut self, end: usize) -> Result<Step, ParseError> {
        self.notify(Event::MessageComplete, end)?;
        self.messages_completed += 1;
        self.active = None;
        self.mark = None;

        if let Some(upgrade) = self.info.upgrade {
            self.state = State::Upgraded;
            tracing::debug!(?upgrade, end, "connection upgrade");
            return Ok(self.upgraded(end));
        }
        let keep_alive = self.info.should_keep_alive();
        self.state = if keep_alive { State::Start } else { State::Closed };
        tracing::debug!(keep_alive, end, "message complete");
        Ok(Step::Advance(end))
    }

    /// Stop for a protocol switch at `end`. With a pause pending the parser
    /// pauses first and reports the upgrade once held-back callbacks ran.
    fn upgraded(&mut self, end: usize) -> Step {
        if self.pause_requested {
            self.upgrade_unreported = true;
            Step::Advance(end)
        } else {
            Step::Stop(ParseStatus::Upgraded(end))
        }
    }
}

impl<T: Default> Parser<'_, T> {
    /// Replace the user data with its default, returning the old value.
    pub fn take_data(&mut self) -> T {
        std::mem::take(&mut self.data)
    }
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
