use std::fmt;

use thiserror::Error;

use crate::callbacks::Event;

/// First code of the range reserved for errors raised by callbacks through
/// [`Control::Error`](crate::Control::Error).
pub const CALLBACK_CODE_BASE: u16 = 64;

/// Closed set of failure kinds the parser can report.
///
/// Codes `1..=18` (except `14`) and `25` match the numbering of the classic C
/// HTTP parser so logs stay comparable; the remaining kinds extend it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The parser reached a state it should never be in.
    Internal,
    /// A strict-mode rule was violated (obsolete folding, stray whitespace).
    Strict,
    /// A bare LF was seen where CRLF is required.
    CrExpected,
    /// A CR was not followed by LF.
    LfExpected,
    /// `Content-Length` conflicts with `Transfer-Encoding`.
    UnexpectedContentLength,
    /// The stream ended, or data followed `Connection: close`, mid-message.
    ClosedConnection,
    /// Unknown or malformed request method.
    InvalidMethod,
    /// Empty or malformed request target.
    InvalidUrl,
    /// A fixed literal (such as `HTTP/`) did not match.
    InvalidConstant,
    /// Unsupported or malformed protocol version.
    InvalidVersion,
    /// Forbidden byte in a header name or value.
    InvalidHeaderToken,
    /// Non-numeric, overflowing, or differing `Content-Length`.
    InvalidContentLength,
    /// Malformed or overflowing chunk size or chunk extension.
    InvalidChunkSize,
    /// A pipelined message of the other kind arrived in `MessageMode::Both`.
    SiblingMessageInProgress,
    /// `execute` was called while paused.
    Paused,
    /// `execute` was called after an upgrade without resuming.
    PausedUpgrade,
    /// `execute` was called after the HTTP/2 preface without resuming.
    PausedH2Upgrade,
    /// The embedder aborted the parser through [`Parser::abort`](crate::Parser::abort).
    User,
    /// Status code is not three digits.
    InvalidStatus,
    /// `Transfer-Encoding` on a request does not end with `chunked`.
    InvalidTransferEncoding,
    /// The header block exceeded the configured size or count.
    HeaderOverflow,
    /// The named callback aborted parsing.
    Callback(Event),
}

impl ErrorKind {
    const FIXED: [ErrorKind; 21] = [
        Self::Internal,
        Self::Strict,
        Self::CrExpected,
        Self::LfExpected,
        Self::UnexpectedContentLength,
        Self::ClosedConnection,
        Self::InvalidMethod,
        Self::InvalidUrl,
        Self::InvalidConstant,
        Self::InvalidVersion,
        Self::InvalidHeaderToken,
        Self::InvalidContentLength,
        Self::InvalidChunkSize,
        Self::SiblingMessageInProgress,
        Self::Paused,
        Self::PausedUpgrade,
        Self::PausedH2Upgrade,
        Self::User,
        Self::InvalidStatus,
        Self::InvalidTransferEncoding,
        Self::HeaderOverflow,
    ];

    /// Stable numeric code of this kind.
    pub fn code(&self) -> u16 {
        match self {
            Self::Internal => 1,
            Self::Strict => 2,
            Self::LfExpected => 3,
            Self::UnexpectedContentLength => 4,
            Self::ClosedConnection => 5,
            Self::InvalidMethod => 6,
            Self::InvalidUrl => 7,
            Self::InvalidConstant => 8,
            Self::InvalidVersion => 9,
            Self::InvalidHeaderToken => 10,
            Self::InvalidContentLength => 11,
            Self::InvalidChunkSize => 12,
            Self::SiblingMessageInProgress => 13,
            Self::Paused => 15,
            Self::PausedUpgrade => 16,
            Self::PausedH2Upgrade => 17,
            Self::User => 18,
            Self::InvalidStatus => 19,
            Self::InvalidTransferEncoding => 20,
            Self::HeaderOverflow => 21,
            Self::CrExpected => 25,
            Self::Callback(event) => CALLBACK_CODE_BASE + event.index(),
        }
    }

    /// Look a kind up by its numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        if code >= CALLBACK_CODE_BASE {
            return Event::from_index(code - CALLBACK_CODE_BASE).map(Self::Callback);
        }
        Self::FIXED.iter().copied().find(|kind| kind.code() == code)
    }

    /// Upper-case symbolic name, e.g. `INVALID_METHOD` or `CB_HEADERS_COMPLETE`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Internal => "INTERNAL",
            Self::Strict => "STRICT",
            Self::CrExpected => "CR_EXPECTED",
            Self::LfExpected => "LF_EXPECTED",
            Self::UnexpectedContentLength => "UNEXPECTED_CONTENT_LENGTH",
            Self::ClosedConnection => "CLOSED_CONNECTION",
            Self::InvalidMethod => "INVALID_METHOD",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidConstant => "INVALID_CONSTANT",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::InvalidHeaderToken => "INVALID_HEADER_TOKEN",
            Self::InvalidContentLength => "INVALID_CONTENT_LENGTH",
            Self::InvalidChunkSize => "INVALID_CHUNK_SIZE",
            Self::SiblingMessageInProgress => "SIBLING_MESSAGE_IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::PausedUpgrade => "PAUSED_UPGRADE",
            Self::PausedH2Upgrade => "PAUSED_H2_UPGRADE",
            Self::User => "USER",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::InvalidTransferEncoding => "INVALID_TRANSFER_ENCODING",
            Self::HeaderOverflow => "HEADER_OVERFLOW",
            Self::Callback(event) => event.error_name(),
        }
    }

    /// Look a kind up by its symbolic name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::FIXED
            .iter()
            .copied()
            .chain(Event::ALL.iter().copied().map(Self::Callback))
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Short human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Internal => "internal parser error",
            Self::Strict => "strict mode assertion failed",
            Self::CrExpected => "expected CR before LF",
            Self::LfExpected => "expected LF after CR",
            Self::UnexpectedContentLength => "unexpected content-length header",
            Self::ClosedConnection => "connection closed before message completed",
            Self::InvalidMethod => "invalid HTTP method",
            Self::InvalidUrl => "invalid URL",
            Self::InvalidConstant => "invalid constant string",
            Self::InvalidVersion => "invalid HTTP version",
            Self::InvalidHeaderToken => "invalid header token",
            Self::InvalidContentLength => "invalid content-length value",
            Self::InvalidChunkSize => "invalid chunk size",
            Self::SiblingMessageInProgress => "sibling message in progress",
            Self::Paused => "parser is paused",
            Self::PausedUpgrade => "parser is paused on upgrade",
            Self::PausedH2Upgrade => "parser is paused on H2 upgrade",
            Self::User => "aborted by the embedder",
            Self::InvalidStatus => "invalid status code",
            Self::InvalidTransferEncoding => "invalid transfer-encoding",
            Self::HeaderOverflow => "header section too large",
            Self::Callback(_) => "callback error",
        }
    }

    /// `true` for kinds raised by the embedder rather than the grammar.
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::User | Self::Callback(_))
    }

    /// `true` for the misuse kinds that leave the parser usable after `resume`.
    pub fn is_pause(&self) -> bool {
        matches!(
            self,
            Self::Paused | Self::PausedUpgrade | Self::PausedH2Upgrade
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parse failure: what went wrong, why, and where.
///
/// `offset` is the index, within the buffer passed to the failing
/// [`Parser::execute`](crate::Parser::execute) call, of the byte being
/// processed when the failure was detected. Errors raised by
/// [`Parser::finish`](crate::Parser::finish) carry offset `0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {reason} (at offset {offset})")]
pub struct ParseError {
    kind: ErrorKind,
    reason: String,
    offset: usize,
}

impl ParseError {
    pub fn new(kind: ErrorKind, reason: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            reason: reason.into(),
            offset,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_lookup() {
        for kind in ErrorKind::FIXED {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn classic_codes_are_stable() {
        assert_eq!(ErrorKind::Internal.code(), 1);
        assert_eq!(ErrorKind::InvalidMethod.code(), 6);
        assert_eq!(ErrorKind::User.code(), 18);
        assert_eq!(ErrorKind::CrExpected.code(), 25);
    }

    #[test]
    fn callback_kinds_live_in_their_own_range() {
        let kind = ErrorKind::Callback(Event::HeadersComplete);
        assert!(kind.code() >= CALLBACK_CODE_BASE);
        assert!(kind.is_callback());
        assert_eq!(kind.name(), "CB_HEADERS_COMPLETE");
        assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        assert_eq!(ErrorKind::from_name("cb_headers_complete"), Some(kind));
        assert!(!ErrorKind::InvalidUrl.is_callback());
    }

    #[test]
    fn unknown_codes_and_names_are_rejected() {
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(14), None);
        assert_eq!(ErrorKind::from_code(24), None);
        assert_eq!(ErrorKind::from_code(CALLBACK_CODE_BASE + 200), None);
        assert_eq!(ErrorKind::from_name("NOPE"), None);
    }

    #[test]
    fn display_includes_kind_reason_and_offset() {
        let err = ParseError::new(ErrorKind::InvalidMethod, "unknown method 'FOO'", 3);
        assert_eq!(
            err.to_string(),
            "INVALID_METHOD: unknown method 'FOO' (at offset 3)"
        );
    }
}
