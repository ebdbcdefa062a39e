//! Owned views of the event stream.
//!
//! [`MessageCollector`] assembles [`HttpMessage`] values for the one-shot
//! helpers and the CLI. [`EventRecorder`] keeps the raw event sequence.

use crate::callbacks::{Callbacks, Context, Control, Event, Span};
use crate::scan::trim_ows;
use crate::types::{Header, HttpMessage, HttpRequest, HttpResponse, MessageKind};

/// User data that copies every completed message out of the stream.
///
/// Pair it with [`MessageCollector::CALLBACKS`]:
///
/// ```rust
/// use spanwire::{MessageCollector, MessageMode, Parser};
///
/// let mut parser = Parser::new(
///     MessageMode::Request,
///     &MessageCollector::CALLBACKS,
///     MessageCollector::new(),
/// );
/// parser.execute(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n").unwrap();
/// assert_eq!(parser.data.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MessageCollector {
    messages: Vec<HttpMessage>,
    url: Vec<u8>,
    reason: Vec<u8>,
    field: Vec<u8>,
    value: Vec<u8>,
    headers: Vec<Header>,
    trailers: Vec<Header>,
    body: Vec<u8>,
}

impl MessageCollector {
    pub const CALLBACKS: Callbacks<MessageCollector> = Callbacks {
        on_message_begin: Some(Self::on_message_begin),
        on_url: Some(Self::on_url),
        on_status: Some(Self::on_status),
        on_header_field: Some(Self::on_header_field),
        on_header_value: Some(Self::on_header_value),
        on_header_value_complete: Some(Self::on_header_value_complete),
        on_body: Some(Self::on_body),
        on_message_complete: Some(Self::on_message_complete),
        ..Callbacks::new()
    };

    pub fn new() -> Self {
        Self::default()
    }

    /// Messages completed so far, in stream order.
    pub fn messages(&self) -> &[HttpMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drain the completed messages, keeping any partial one.
    pub fn take_messages(&mut self) -> Vec<HttpMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn into_messages(self) -> Vec<HttpMessage> {
        self.messages
    }

    fn on_message_begin(cx: &mut Context<'_, Self>) -> Control {
        let this = &mut *cx.data;
        this.url.clear();
        this.reason.clear();
        this.field.clear();
        this.value.clear();
        this.headers.clear();
        this.trailers.clear();
        this.body.clear();
        Control::Continue
    }

    fn on_url(cx: &mut Context<'_, Self>, span: Span<'_>) -> Control {
        cx.data.url.extend_from_slice(&span);
        Control::Continue
    }

    fn on_status(cx: &mut Context<'_, Self>, span: Span<'_>) -> Control {
        cx.data.reason.extend_from_slice(&span);
        Control::Continue
    }

    fn on_header_field(cx: &mut Context<'_, Self>, span: Span<'_>) -> Control {
        cx.data.field.extend_from_slice(&span);
        Control::Continue
    }

    fn on_header_value(cx: &mut Context<'_, Self>, span: Span<'_>) -> Control {
        cx.data.value.extend_from_slice(&span);
        Control::Continue
    }

    fn on_header_value_complete(cx: &mut Context<'_, Self>) -> Control {
        let in_trailer = cx.in_trailer();
        let this = &mut *cx.data;
        let header = Header {
            name: String::from_utf8_lossy(&this.field).into_owned(),
            value: String::from_utf8_lossy(trim_ows(&this.value)).into_owned(),
        };
        this.field.clear();
        this.value.clear();
        if in_trailer {
            this.trailers.push(header);
        } else {
            this.headers.push(header);
        }
        Control::Continue
    }

    fn on_body(cx: &mut Context<'_, Self>, span: Span<'_>) -> Control {
        cx.data.body.extend_from_slice(&span);
        Control::Continue
    }

    fn on_message_complete(cx: &mut Context<'_, Self>) -> Control {
        let Some(version) = cx.version() else {
            return Control::Error;
        };
        let kind = cx.kind();
        let method = cx.method();
        let status = cx.status_code();

        let this = &mut *cx.data;
        let headers = std::mem::take(&mut this.headers);
        let trailers = std::mem::take(&mut this.trailers);
        let body = Some(std::mem::take(&mut this.body)).filter(|b| !b.is_empty());

        let message = match (kind, method) {
            (Some(MessageKind::Request), Some(method)) => HttpMessage::Request(HttpRequest {
                method,
                uri: String::from_utf8_lossy(&this.url).into_owned(),
                version,
                headers,
                trailers,
                body,
            }),
            (Some(MessageKind::Response), _) => HttpMessage::Response(HttpResponse {
                version,
                status,
                reason: String::from_utf8_lossy(&this.reason).into_owned(),
                headers,
                trailers,
                body,
            }),
            _ => return Control::Error,
        };
        this.messages.push(message);
        Control::Continue
    }
}

// ---------------------------------------------------------------------------
// Event recorder
// ---------------------------------------------------------------------------

/// One recorded callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event: Event,
    /// Copy of the span for data events.
    pub data: Option<Vec<u8>>,
    /// Buffer offset of the span for data events.
    pub offset: Option<usize>,
}

/// User data that records every event in order, with copies of the spans.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<RecordedEvent>,
}

macro_rules! recorder_callbacks {
    (
        notify { $($nslot:ident => $nevent:ident),* $(,)? }
        data { $($dslot:ident => $devent:ident),* $(,)? }
    ) => {
        impl EventRecorder {
            /// Callback table with every slot registered.
            pub const CALLBACKS: Callbacks<EventRecorder> = Callbacks {
                $(
                    $nslot: Some({
                        fn record(cx: &mut Context<'_, EventRecorder>) -> Control {
                            cx.data.record(Event::$nevent, None)
                        }
                        record
                    }),
                )*
                $(
                    $dslot: Some({
                        fn record(cx: &mut Context<'_, EventRecorder>, span: Span<'_>) -> Control {
                            cx.data.record(Event::$devent, Some(span))
                        }
                        record
                    }),
                )*
            };
        }
    };
}

recorder_callbacks! {
    notify {
        on_message_begin => MessageBegin,
        on_method_complete => MethodComplete,
        on_url_complete => UrlComplete,
        on_version_complete => VersionComplete,
        on_status_complete => StatusComplete,
        on_header_field_complete => HeaderFieldComplete,
        on_header_value_complete => HeaderValueComplete,
        on_headers_complete => HeadersComplete,
        on_chunk_header => ChunkHeader,
        on_chunk_extension_name_complete => ChunkExtensionNameComplete,
        on_chunk_extension_value_complete => ChunkExtensionValueComplete,
        on_chunk_complete => ChunkComplete,
        on_message_complete => MessageComplete,
        on_reset => Reset,
    }
    data {
        on_method => Method,
        on_url => Url,
        on_version => Version,
        on_status => Status,
        on_header_field => HeaderField,
        on_header_value => HeaderValue,
        on_chunk_extension_name => ChunkExtensionName,
        on_chunk_extension_value => ChunkExtensionValue,
        on_body => Body,
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    /// Events with adjacent fragments of the same data event joined, so the
    /// result no longer depends on where the input was split.
    pub fn merged(&self) -> Vec<(Event, Option<Vec<u8>>)> {
        let mut out: Vec<(Event, Option<Vec<u8>>)> = Vec::with_capacity(self.events.len());
        for recorded in &self.events {
            match (out.last_mut(), &recorded.data) {
                (Some((event, Some(joined))), Some(data)) if *event == recorded.event => {
                    joined.extend_from_slice(data);
                }
                _ => out.push((recorded.event, recorded.data.clone())),
            }
        }
        out
    }

    fn record(&mut self, event: Event, span: Option<Span<'_>>) -> Control {
        self.events.push(RecordedEvent {
            event,
            offset: span.map(|s| s.offset()),
            data: span.map(|s| s.as_bytes().to_vec()),
        });
        Control::Continue
    }
}
