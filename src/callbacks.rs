//! The callback table and the values exchanged with callbacks.
//!
//! A [`Callbacks`] table is a fixed set of optional function pointers. It holds
//! no state, so one table can be shared by reference across any number of
//! parsers; per-connection state lives in the parser's user-data slot and is
//! handed to every callback through [`Context::data`].

use std::fmt;
use std::ops::Deref;

use crate::info::MessageInfo;

/// What a callback asks the parser to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    Continue,
    /// Stop after the current byte. No further callback fires until
    /// [`Parser::resume`](crate::Parser::resume); notifications already due
    /// for that byte are held back and delivered by the next `execute`.
    Pause,
    /// Abort with [`ErrorKind::Callback`](crate::ErrorKind::Callback).
    Error,
    /// Only valid from `on_headers_complete`: treat the message as bodiless
    /// (responses to `HEAD`, for instance).
    SkipBody,
}

/// Every event the parser can emit, in the order of the callback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Event {
    MessageBegin = 0,
    Method = 1,
    MethodComplete = 2,
    Url = 3,
    UrlComplete = 4,
    Version = 5,
    VersionComplete = 6,
    Status = 7,
    StatusComplete = 8,
    HeaderField = 9,
    HeaderFieldComplete = 10,
    HeaderValue = 11,
    HeaderValueComplete = 12,
    HeadersComplete = 13,
    ChunkHeader = 14,
    ChunkExtensionName = 15,
    ChunkExtensionNameComplete = 16,
    ChunkExtensionValue = 17,
    ChunkExtensionValueComplete = 18,
    Body = 19,
    ChunkComplete = 20,
    MessageComplete = 21,
    Reset = 22,
}

impl Event {
    pub const ALL: [Event; 23] = [
        Self::MessageBegin,
        Self::Method,
        Self::MethodComplete,
        Self::Url,
        Self::UrlComplete,
        Self::Version,
        Self::VersionComplete,
        Self::Status,
        Self::StatusComplete,
        Self::HeaderField,
        Self::HeaderFieldComplete,
        Self::HeaderValue,
        Self::HeaderValueComplete,
        Self::HeadersComplete,
        Self::ChunkHeader,
        Self::ChunkExtensionName,
        Self::ChunkExtensionNameComplete,
        Self::ChunkExtensionValue,
        Self::ChunkExtensionValueComplete,
        Self::Body,
        Self::ChunkComplete,
        Self::MessageComplete,
        Self::Reset,
    ];

    pub fn index(&self) -> u16 {
        *self as u16
    }

    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// `true` for events that carry a [`Span`].
    pub fn carries_data(&self) -> bool {
        matches!(
            self,
            Self::Method
                | Self::Url
                | Self::Version
                | Self::Status
                | Self::HeaderField
                | Self::HeaderValue
                | Self::ChunkExtensionName
                | Self::ChunkExtensionValue
                | Self::Body
        )
    }

    /// Snake-case name matching the callback slot without its `on_` prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageBegin => "message_begin",
            Self::Method => "method",
            Self::MethodComplete => "method_complete",
            Self::Url => "url",
            Self::UrlComplete => "url_complete",
            Self::Version => "version",
            Self::VersionComplete => "version_complete",
            Self::Status => "status",
            Self::StatusComplete => "status_complete",
            Self::HeaderField => "header_field",
            Self::HeaderFieldComplete => "header_field_complete",
            Self::HeaderValue => "header_value",
            Self::HeaderValueComplete => "header_value_complete",
            Self::HeadersComplete => "headers_complete",
            Self::ChunkHeader => "chunk_header",
            Self::ChunkExtensionName => "chunk_extension_name",
            Self::ChunkExtensionNameComplete => "chunk_extension_name_complete",
            Self::ChunkExtensionValue => "chunk_extension_value",
            Self::ChunkExtensionValueComplete => "chunk_extension_value_complete",
            Self::Body => "body",
            Self::ChunkComplete => "chunk_complete",
            Self::MessageComplete => "message_complete",
            Self::Reset => "reset",
        }
    }

    pub(crate) fn error_name(&self) -> &'static str {
        match self {
            Self::MessageBegin => "CB_MESSAGE_BEGIN",
            Self::Method => "CB_METHOD",
            Self::MethodComplete => "CB_METHOD_COMPLETE",
            Self::Url => "CB_URL",
            Self::UrlComplete => "CB_URL_COMPLETE",
            Self::Version => "CB_VERSION",
            Self::VersionComplete => "CB_VERSION_COMPLETE",
            Self::Status => "CB_STATUS",
            Self::StatusComplete => "CB_STATUS_COMPLETE",
            Self::HeaderField => "CB_HEADER_FIELD",
            Self::HeaderFieldComplete => "CB_HEADER_FIELD_COMPLETE",
            Self::HeaderValue => "CB_HEADER_VALUE",
            Self::HeaderValueComplete => "CB_HEADER_VALUE_COMPLETE",
            Self::HeadersComplete => "CB_HEADERS_COMPLETE",
            Self::ChunkHeader => "CB_CHUNK_HEADER",
            Self::ChunkExtensionName => "CB_CHUNK_EXTENSION_NAME",
            Self::ChunkExtensionNameComplete => "CB_CHUNK_EXTENSION_NAME_COMPLETE",
            Self::ChunkExtensionValue => "CB_CHUNK_EXTENSION_VALUE",
            Self::ChunkExtensionValueComplete => "CB_CHUNK_EXTENSION_VALUE_COMPLETE",
            Self::Body => "CB_BODY",
            Self::ChunkComplete => "CB_CHUNK_COMPLETE",
            Self::MessageComplete => "CB_MESSAGE_COMPLETE",
            Self::Reset => "CB_RESET",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fragment of a token inside the buffer given to the current
/// [`Parser::execute`](crate::Parser::execute) call.
///
/// Valid only for the duration of the callback. A token split across several
/// buffers arrives as several spans; the matching `*_complete` event marks
/// its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'b> {
    bytes: &'b [u8],
    offset: usize,
}

impl<'b> Span<'b> {
    pub(crate) fn new(bytes: &'b [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    /// Offset of the first byte within the `execute` buffer.
    ///
    /// In `MessageMode::Both`, a leading `H` that ended the previous buffer is
    /// replayed from static storage once the message kind is known; that span
    /// reports offset `0`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'b [u8] {
        self.bytes
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.bytes).into_owned()
    }
}

impl Deref for Span<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

/// What a callback sees: read-only message metadata plus the user data.
///
/// Derefs to [`MessageInfo`], so `cx.status_code()`, `cx.should_keep_alive()`
/// and friends work directly.
pub struct Context<'p, T> {
    info: &'p MessageInfo,
    pub data: &'p mut T,
}

impl<'p, T> Context<'p, T> {
    pub(crate) fn new(info: &'p MessageInfo, data: &'p mut T) -> Self {
        Self { info, data }
    }

    pub fn info(&self) -> &MessageInfo {
        self.info
    }
}

impl<T> Deref for Context<'_, T> {
    type Target = MessageInfo;

    fn deref(&self) -> &MessageInfo {
        self.info
    }
}

/// Callback without payload.
pub type NotifyFn<T> = fn(&mut Context<'_, T>) -> Control;
/// Callback receiving a token fragment.
pub type DataFn<T> = fn(&mut Context<'_, T>, Span<'_>) -> Control;

/// Fixed-shape table of optional event handlers. Empty slots are no-ops.
pub struct Callbacks<T> {
    pub on_message_begin: Option<NotifyFn<T>>,
    pub on_method: Option<DataFn<T>>,
    pub on_method_complete: Option<NotifyFn<T>>,
    pub on_url: Option<DataFn<T>>,
    pub on_url_complete: Option<NotifyFn<T>>,
    pub on_version: Option<DataFn<T>>,
    pub on_version_complete: Option<NotifyFn<T>>,
    /// Reason phrase of a response.
    pub on_status: Option<DataFn<T>>,
    pub on_status_complete: Option<NotifyFn<T>>,
    pub on_header_field: Option<DataFn<T>>,
    pub on_header_field_complete: Option<NotifyFn<T>>,
    pub on_header_value: Option<DataFn<T>>,
    pub on_header_value_complete: Option<NotifyFn<T>>,
    pub on_headers_complete: Option<NotifyFn<T>>,
    /// A chunk-size line was read; see [`MessageInfo::chunk_size`].
    pub on_chunk_header: Option<NotifyFn<T>>,
    pub on_chunk_extension_name: Option<DataFn<T>>,
    pub on_chunk_extension_name_complete: Option<NotifyFn<T>>,
    pub on_chunk_extension_value: Option<DataFn<T>>,
    pub on_chunk_extension_value_complete: Option<NotifyFn<T>>,
    pub on_body: Option<DataFn<T>>,
    pub on_chunk_complete: Option<NotifyFn<T>>,
    pub on_message_complete: Option<NotifyFn<T>>,
    /// A pipelined message is about to begin on the same parser.
    pub on_reset: Option<NotifyFn<T>>,
}

impl<T> Callbacks<T> {
    /// A table with every slot empty.
    pub const fn new() -> Self {
        Self {
            on_message_begin: None,
            on_method: None,
            on_method_complete: None,
            on_url: None,
            on_url_complete: None,
            on_version: None,
            on_version_complete: None,
            on_status: None,
            on_status_complete: None,
            on_header_field: None,
            on_header_field_complete: None,
            on_header_value: None,
            on_header_value_complete: None,
            on_headers_complete: None,
            on_chunk_header: None,
            on_chunk_extension_name: None,
            on_chunk_extension_name_complete: None,
            on_chunk_extension_value: None,
            on_chunk_extension_value_complete: None,
            on_body: None,
            on_chunk_complete: None,
            on_message_complete: None,
            on_reset: None,
        }
    }

    pub(crate) fn notify_slot(&self, event: Event) -> Option<NotifyFn<T>> {
        match event {
            Event::MessageBegin => self.on_message_begin,
            Event::MethodComplete => self.on_method_complete,
            Event::UrlComplete => self.on_url_complete,
            Event::VersionComplete => self.on_version_complete,
            Event::StatusComplete => self.on_status_complete,
            Event::HeaderFieldComplete => self.on_header_field_complete,
            Event::HeaderValueComplete => self.on_header_value_complete,
            Event::HeadersComplete => self.on_headers_complete,
            Event::ChunkHeader => self.on_chunk_header,
            Event::ChunkExtensionNameComplete => self.on_chunk_extension_name_complete,
            Event::ChunkExtensionValueComplete => self.on_chunk_extension_value_complete,
            Event::ChunkComplete => self.on_chunk_complete,
            Event::MessageComplete => self.on_message_complete,
            Event::Reset => self.on_reset,
            _ => None,
        }
    }

    pub(crate) fn data_slot(&self, event: Event) -> Option<DataFn<T>> {
        match event {
            Event::Method => self.on_method,
            Event::Url => self.on_url,
            Event::Version => self.on_version,
            Event::Status => self.on_status,
            Event::HeaderField => self.on_header_field,
            Event::HeaderValue => self.on_header_value,
            Event::ChunkExtensionName => self.on_chunk_extension_name,
            Event::ChunkExtensionValue => self.on_chunk_extension_value,
            Event::Body => self.on_body,
            _ => None,
        }
    }
}

// Manual impls: derives would demand `T: Clone`/`T: Default` for a table that
// only stores function pointers.
impl<T> Clone for Callbacks<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Callbacks<T> {}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = Event::ALL
            .iter()
            .filter(|e| self.notify_slot(**e).is_some() || self.data_slot(**e).is_some())
            .map(Event::as_str)
            .collect();
        f.debug_struct("Callbacks")
            .field("registered", &registered)
            .finish()
    }
}
