use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Request methods the parser recognizes.
///
/// Covers RFC 9110, WebDAV, CalDAV and the other HTTP extensions commonly
/// seen on the wire. [`Method::code`] keeps the classic C parser numbering.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    DELETE = 0,
    GET = 1,
    HEAD = 2,
    POST = 3,
    PUT = 4,
    CONNECT = 5,
    OPTIONS = 6,
    TRACE = 7,
    COPY = 8,
    LOCK = 9,
    MKCOL = 10,
    MOVE = 11,
    PROPFIND = 12,
    PROPPATCH = 13,
    SEARCH = 14,
    UNLOCK = 15,
    BIND = 16,
    REBIND = 17,
    UNBIND = 18,
    ACL = 19,
    REPORT = 20,
    MKACTIVITY = 21,
    CHECKOUT = 22,
    MERGE = 23,
    MSEARCH = 24,
    NOTIFY = 25,
    SUBSCRIBE = 26,
    UNSUBSCRIBE = 27,
    PATCH = 28,
    PURGE = 29,
    MKCALENDAR = 30,
    LINK = 31,
    UNLINK = 32,
    SOURCE = 33,
    PRI = 34,
    QUERY = 46,
}

impl Method {
    pub const ALL: [Method; 36] = [
        Self::DELETE,
        Self::GET,
        Self::HEAD,
        Self::POST,
        Self::PUT,
        Self::CONNECT,
        Self::OPTIONS,
        Self::TRACE,
        Self::COPY,
        Self::LOCK,
        Self::MKCOL,
        Self::MOVE,
        Self::PROPFIND,
        Self::PROPPATCH,
        Self::SEARCH,
        Self::UNLOCK,
        Self::BIND,
        Self::REBIND,
        Self::UNBIND,
        Self::ACL,
        Self::REPORT,
        Self::MKACTIVITY,
        Self::CHECKOUT,
        Self::MERGE,
        Self::MSEARCH,
        Self::NOTIFY,
        Self::SUBSCRIBE,
        Self::UNSUBSCRIBE,
        Self::PATCH,
        Self::PURGE,
        Self::MKCALENDAR,
        Self::LINK,
        Self::UNLINK,
        Self::SOURCE,
        Self::PRI,
        Self::QUERY,
    ];

    /// Longest method name, in bytes.
    pub const MAX_LEN: usize = 11;

    /// Match a method token exactly (methods are case-sensitive).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().as_bytes() == bytes)
    }

    /// Look a method up by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.code() == code)
    }

    /// Numeric code, compatible with the classic C parser's method table.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Return the method as a static string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DELETE => "DELETE",
            Self::GET => "GET",
            Self::HEAD => "HEAD",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::CONNECT => "CONNECT",
            Self::OPTIONS => "OPTIONS",
            Self::TRACE => "TRACE",
            Self::COPY => "COPY",
            Self::LOCK => "LOCK",
            Self::MKCOL => "MKCOL",
            Self::MOVE => "MOVE",
            Self::PROPFIND => "PROPFIND",
            Self::PROPPATCH => "PROPPATCH",
            Self::SEARCH => "SEARCH",
            Self::UNLOCK => "UNLOCK",
            Self::BIND => "BIND",
            Self::REBIND => "REBIND",
            Self::UNBIND => "UNBIND",
            Self::ACL => "ACL",
            Self::REPORT => "REPORT",
            Self::MKACTIVITY => "MKACTIVITY",
            Self::CHECKOUT => "CHECKOUT",
            Self::MERGE => "MERGE",
            Self::MSEARCH => "M-SEARCH",
            Self::NOTIFY => "NOTIFY",
            Self::SUBSCRIBE => "SUBSCRIBE",
            Self::UNSUBSCRIBE => "UNSUBSCRIBE",
            Self::PATCH => "PATCH",
            Self::PURGE => "PURGE",
            Self::MKCALENDAR => "MKCALENDAR",
            Self::LINK => "LINK",
            Self::UNLINK => "UNLINK",
            Self::SOURCE => "SOURCE",
            Self::PRI => "PRI",
            Self::QUERY => "QUERY",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// HTTP protocol version as seen on the start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };
    pub const HTTP_20: Version = Version { major: 2, minor: 0 };

    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// Which start lines a parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MessageMode {
    Request,
    Response,
    /// Decide from the first message on the connection.
    Both,
}

/// The kind of one parsed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
}

impl MessageMode {
    /// The fixed kind for `Request`/`Response`, `None` for `Both`.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Request => Some(MessageKind::Request),
            Self::Response => Some(MessageKind::Response),
            Self::Both => None,
        }
    }
}

/// Why parsing stopped with [`ParseStatus::Upgraded`](crate::ParseStatus::Upgraded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Upgrade {
    /// `Upgrade` header with `Connection: upgrade`, or a `101` response.
    Protocol,
    /// A `CONNECT` request.
    Connect,
    /// The `PRI * HTTP/2.0` connection preface.
    H2Preface,
}

// ---------------------------------------------------------------------------
// Owned messages (built by the collector)
// ---------------------------------------------------------------------------

/// A single HTTP header field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Header field name (original casing preserved).
    pub name: String,
    /// Header field value (leading/trailing OWS trimmed).
    pub value: String,
}

fn find_header<'h>(headers: &'h [Header], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

fn filter_headers<'h>(headers: &'h [Header], name: &str) -> Vec<&'h str> {
    headers
        .iter()
        .filter(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .collect()
}

/// Serialize body bytes as a UTF-8 string (lossy) for JSON output.
fn serialize_body<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match body {
        None => s.serialize_none(),
        Some(bytes) => s.serialize_str(&String::from_utf8_lossy(bytes)),
    }
}

/// A fully parsed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpRequest {
    pub method: Method,
    /// The raw request target, exactly as received.
    pub uri: String,
    pub version: Version,
    pub headers: Vec<Header>,
    /// Trailer fields of a chunked body.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailers: Vec<Header>,
    #[serde(serialize_with = "serialize_body")]
    pub body: Option<Vec<u8>>,
}

/// A fully parsed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    pub version: Version,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailers: Vec<Header>,
    #[serde(serialize_with = "serialize_body")]
    pub body: Option<Vec<u8>>,
}

/// Either kind of message, as produced by a `MessageMode::Both` parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HttpMessage {
    Request(HttpRequest),
    Response(HttpResponse),
}

macro_rules! message_accessors {
    ($ty:ty) => {
        impl $ty {
            /// Return the body as a UTF-8 `&str` if it is valid UTF-8.
            pub fn body_as_str(&self) -> Option<&str> {
                self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
            }

            /// Return the body as a lossy UTF-8 string (always succeeds).
            pub fn body_as_lossy_string(&self) -> Option<String> {
                self.body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
            }

            /// Return the raw body bytes.
            pub fn body_bytes(&self) -> Option<&[u8]> {
                self.body.as_deref()
            }

            /// Look up the first header value by name (case-insensitive).
            pub fn header_value(&self, name: &str) -> Option<&str> {
                find_header(&self.headers, name)
            }

            /// Return all values for headers matching `name` (case-insensitive).
            pub fn header_values(&self, name: &str) -> Vec<&str> {
                filter_headers(&self.headers, name)
            }

            /// Look up the first trailer value by name (case-insensitive).
            pub fn trailer_value(&self, name: &str) -> Option<&str> {
                find_header(&self.trailers, name)
            }

            /// Parse the `Content-Length` header, if present and valid.
            pub fn content_length(&self) -> Option<u64> {
                self.header_value("content-length")
                    .and_then(|v| v.trim().parse().ok())
            }

            /// Return `true` if the `Transfer-Encoding` header contains `chunked`.
            pub fn is_chunked(&self) -> bool {
                self.header_value("transfer-encoding")
                    .map(|v| v.to_ascii_lowercase().contains("chunked"))
                    .unwrap_or(false)
            }
        }
    };
}

message_accessors!(HttpRequest);
message_accessors!(HttpResponse);

impl HttpMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request(_) => MessageKind::Request,
            Self::Response(_) => MessageKind::Response,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Self::Request(r) => r.version,
            Self::Response(r) => r.version,
        }
    }

    pub fn headers(&self) -> &[Header] {
        match self {
            Self::Request(r) => &r.headers,
            Self::Response(r) => &r.headers,
        }
    }

    pub fn trailers(&self) -> &[Header] {
        match self {
            Self::Request(r) => &r.trailers,
            Self::Response(r) => &r.trailers,
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        match self {
            Self::Request(r) => r.body.as_deref(),
            Self::Response(r) => r.body.as_deref(),
        }
    }

    pub fn as_request(&self) -> Option<&HttpRequest> {
        match self {
            Self::Request(r) => Some(r),
            Self::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Response(r) => Some(r),
            Self::Request(_) => None,
        }
    }
}
