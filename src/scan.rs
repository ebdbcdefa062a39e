//! Byte classes and header interpretation used by the scanner.

use crate::info::HeaderFlags;

// ---------------------------------------------------------------------------
// Character classification helpers (RFC 9110 / RFC 9112)
// ---------------------------------------------------------------------------

/// `tchar`: characters allowed in HTTP tokens (method, header names).
///
/// ```text
/// tchar = "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "." /
///         "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA
/// ```
#[inline]
pub(crate) fn is_tchar(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
            | b'0'..=b'9'
            | b'a'..=b'z'
            | b'A'..=b'Z'
    )
}

/// Bytes permitted inside a header field value or reason phrase:
/// `SP / HTAB / VCHAR / obs-text`.
#[inline]
pub(crate) fn is_field_content_byte(b: u8) -> bool {
    b == b' ' || b == b'\t' || (0x21..=0x7E).contains(&b) || b >= 0x80
}

/// Bytes permitted in a request target: anything visible, including obs-text.
#[inline]
pub(crate) fn is_url_byte(b: u8) -> bool {
    b > b' ' && b != 0x7F
}

#[inline]
pub(crate) fn is_ows(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Value of a hexadecimal digit.
#[inline]
pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Framing headers
// ---------------------------------------------------------------------------

/// Header fields whose values change how the message is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FramingHeader {
    ContentLength,
    TransferEncoding,
    Connection,
    Upgrade,
}

impl FramingHeader {
    fn from_lowercase(name: &[u8]) -> Option<Self> {
        match name {
            b"content-length" => Some(Self::ContentLength),
            b"transfer-encoding" => Some(Self::TransferEncoding),
            b"connection" | b"proxy-connection" => Some(Self::Connection),
            b"upgrade" => Some(Self::Upgrade),
            _ => None,
        }
    }
}

/// Recognizes framing header names incrementally, across buffer boundaries,
/// without allocating.
#[derive(Debug, Clone, Default)]
pub(crate) struct NameMatcher {
    buf: [u8; 17],
    len: usize,
    overflow: bool,
}

impl NameMatcher {
    pub fn clear(&mut self) {
        self.len = 0;
        self.overflow = false;
    }

    pub fn push(&mut self, b: u8) {
        if self.len < self.buf.len() {
            self.buf[self.len] = b.to_ascii_lowercase();
            self.len += 1;
        } else {
            self.overflow = true;
        }
    }

    pub fn finish(&self) -> Option<FramingHeader> {
        if self.overflow {
            return None;
        }
        FramingHeader::from_lowercase(&self.buf[..self.len])
    }
}

/// Parse a `Content-Length` value: OWS-trimmed decimal digits within `u64`.
pub(crate) fn parse_content_length(value: &[u8]) -> Result<u64, &'static str> {
    let value = trim_ows(value);
    if value.is_empty() {
        return Err("empty Content-Length");
    }
    value.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return Err("non-digit in Content-Length");
        }
        acc.checked_mul(10)
            .and_then(|n| n.checked_add(u64::from(b - b'0')))
            .ok_or("Content-Length overflows 64 bits")
    })
}

/// Record a `Transfer-Encoding` value. The body is chunked only when
/// `chunked` is the final coding of the final header.
pub(crate) fn apply_transfer_encoding(value: &[u8], flags: &mut HeaderFlags) {
    flags.transfer_encoding = true;
    if let Some(last) = list_tokens(value).last() {
        flags.chunked = last.eq_ignore_ascii_case(b"chunked");
    }
}

/// Record the `close`, `keep-alive` and `upgrade` options of `Connection`.
pub(crate) fn apply_connection(value: &[u8], flags: &mut HeaderFlags) {
    for token in list_tokens(value) {
        if token.eq_ignore_ascii_case(b"close") {
            flags.connection_close = true;
        } else if token.eq_ignore_ascii_case(b"keep-alive") {
            flags.connection_keep_alive = true;
        } else if token.eq_ignore_ascii_case(b"upgrade") {
            flags.connection_upgrade = true;
        }
    }
}

/// Non-empty, OWS-trimmed elements of a comma-separated list.
fn list_tokens(value: &[u8]) -> impl Iterator<Item = &[u8]> {
    value
        .split(|&b| b == b',')
        .map(trim_ows)
        .filter(|t| !t.is_empty())
}

pub(crate) fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = value {
        if !is_ows(*first) {
            break;
        }
        value = rest;
    }
    while let [rest @ .., last] = value {
        if !is_ows(*last) {
            break;
        }
        value = rest;
    }
    value
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------
