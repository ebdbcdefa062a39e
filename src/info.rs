use crate::types::{MessageKind, MessageMode, Method, Upgrade, Version};

/// Flags collected from the header block that drive body framing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HeaderFlags {
    pub content_length: bool,
    pub transfer_encoding: bool,
    /// The final transfer coding is `chunked`.
    pub chunked: bool,
    pub connection_close: bool,
    pub connection_keep_alive: bool,
    pub connection_upgrade: bool,
    pub upgrade: bool,
}

/// Metadata of the message currently being parsed.
///
/// Available from callbacks through [`Context`](crate::Context) and from the
/// parser through [`Parser::info`](crate::Parser::info). Values describe the
/// current message only; they are cleared when the next one begins.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub(crate) mode: MessageMode,
    pub(crate) kind: Option<MessageKind>,
    pub(crate) method: Option<Method>,
    pub(crate) status_code: u16,
    pub(crate) version: Option<Version>,
    pub(crate) content_length: Option<u64>,
    pub(crate) chunk_size: u64,
    pub(crate) flags: HeaderFlags,
    pub(crate) skip_body: bool,
    pub(crate) upgrade: Option<Upgrade>,
    pub(crate) headers_complete: bool,
    pub(crate) in_trailer: bool,
    pub(crate) header_count: usize,
}

impl MessageInfo {
    pub(crate) fn new(mode: MessageMode) -> Self {
        Self {
            mode,
            kind: mode.kind(),
            method: None,
            status_code: 0,
            version: None,
            content_length: None,
            chunk_size: 0,
            flags: HeaderFlags::default(),
            skip_body: false,
            upgrade: None,
            headers_complete: false,
            in_trailer: false,
            header_count: 0,
        }
    }

    /// Mode the parser was created with.
    pub fn mode(&self) -> MessageMode {
        self.mode
    }

    /// Kind of the current message, once known.
    pub fn kind(&self) -> Option<MessageKind> {
        self.kind
    }

    /// Request method, once the method token is complete.
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Response status code, `0` until parsed.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// `0` until the version is parsed.
    pub fn http_major(&self) -> u8 {
        self.version.map_or(0, |v| v.major)
    }

    /// `0` until the version is parsed.
    pub fn http_minor(&self) -> u8 {
        self.version.map_or(0, |v| v.minor)
    }

    /// Body length in bytes when it is known up front.
    ///
    /// Before the header block ends this is the declared `Content-Length`, if
    /// any. Afterwards it is also `Some(0)` for bodiless messages, and `None`
    /// for chunked and read-until-EOF bodies.
    pub fn content_length(&self) -> Option<u64> {
        if self.flags.chunked {
            return None;
        }
        if self.headers_complete && !self.has_body() {
            return Some(0);
        }
        if self.headers_complete && self.needs_eof() {
            return None;
        }
        self.content_length
    }

    /// Size of the chunk announced by the last `on_chunk_header` event.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn is_chunked(&self) -> bool {
        self.flags.chunked
    }

    /// `true` while trailer fields of a chunked body are being parsed.
    pub fn in_trailer(&self) -> bool {
        self.in_trailer
    }

    /// Number of header (or trailer) fields seen in the current block.
    pub fn header_count(&self) -> usize {
        self.header_count
    }

    /// Set at `on_headers_complete` when the connection switches protocols
    /// after this message.
    pub fn upgrade(&self) -> Option<Upgrade> {
        self.upgrade
    }

    pub fn is_upgrade(&self) -> bool {
        self.upgrade.is_some()
    }

    /// `true` when the body ends only when the connection closes.
    pub fn needs_eof(&self) -> bool {
        if self.kind != Some(MessageKind::Response) {
            return false;
        }
        if self.skip_body || self.upgrade.is_some() || is_bodyless_status(self.status_code) {
            return false;
        }
        if self.flags.transfer_encoding && !self.flags.chunked {
            return true;
        }
        !(self.flags.chunked || self.content_length.is_some())
    }

    /// Whether the connection may carry another message after this one.
    pub fn should_keep_alive(&self) -> bool {
        let persistent = if self.version.is_some_and(|v| v >= Version::HTTP_11) {
            !self.flags.connection_close
        } else {
            self.flags.connection_keep_alive
        };
        persistent && !self.needs_eof()
    }

    /// Whether any body bytes follow the header block.
    pub(crate) fn has_body(&self) -> bool {
        if self.skip_body {
            return false;
        }
        match self.kind {
            Some(MessageKind::Response) if is_bodyless_status(self.status_code) => false,
            _ if self.flags.chunked => true,
            _ if self.content_length.is_some_and(|n| n > 0) => true,
            Some(MessageKind::Response) => self.needs_eof(),
            _ => false,
        }
    }

    /// Forget everything about the previous message.
    pub(crate) fn clear_message(&mut self) {
        *self = Self::new(self.mode);
    }
}

/// 1xx, 204 and 304 responses never carry a body.
pub(crate) fn is_bodyless_status(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}
