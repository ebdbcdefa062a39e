use serde::Serialize;

use crate::collect::RecordedEvent;
use crate::types::{Header, HttpMessage};

/// Serialize a message (or a slice of them) to a JSON string.
///
/// When `pretty` is `true` the output is indented for readability.
pub fn format_json<M: Serialize + ?Sized>(message: &M, pretty: bool) -> String {
    let result = if pretty {
        serde_json::to_string_pretty(message)
    } else {
        serde_json::to_string(message)
    };
    result.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn start_line(message: &HttpMessage) -> String {
    match message {
        HttpMessage::Request(r) => format!("{} {} {}", r.method, r.uri, r.version),
        HttpMessage::Response(r) if r.reason.is_empty() => format!("{} {}", r.version, r.status),
        HttpMessage::Response(r) => format!("{} {} {}", r.version, r.status, r.reason),
    }
}

fn push_fields(out: &mut String, title: &str, fields: &[Header]) {
    out.push_str(&format!("\n--- {title} ({}) ---\n", fields.len()));
    for field in fields {
        out.push_str(&format!("  {}: {}\n", field.name, field.value));
    }
}

/// Render a message in a human-readable debug format.
pub fn format_debug(message: &HttpMessage) -> String {
    let mut out = String::with_capacity(256);

    match message {
        HttpMessage::Request(r) => {
            out.push_str("=== HTTP Request ===\n");
            out.push_str(&format!("Method:  {}\n", r.method));
            out.push_str(&format!("URI:     {}\n", r.uri));
            out.push_str(&format!("Version: {}\n", r.version));
        }
        HttpMessage::Response(r) => {
            out.push_str("=== HTTP Response ===\n");
            out.push_str(&format!("Version: {}\n", r.version));
            out.push_str(&format!("Status:  {}\n", r.status));
            out.push_str(&format!("Reason:  {}\n", r.reason));
        }
    }

    push_fields(&mut out, "Headers", message.headers());

    match message.body() {
        Some(body) => {
            out.push_str(&format!("\n--- Body ({} bytes) ---\n", body.len()));
            match std::str::from_utf8(body) {
                Ok(s) => out.push_str(s),
                Err(_) => out.push_str(&format!("<binary data: {} bytes>", body.len())),
            }
            out.push('\n');
        }
        None => out.push_str("\n--- No Body ---\n"),
    }

    if !message.trailers().is_empty() {
        push_fields(&mut out, "Trailers", message.trailers());
    }

    out.push_str("====================\n");
    out
}

/// Render only the start line and headers (no body).
pub fn format_headers_only(message: &HttpMessage) -> String {
    let headers = message.headers();
    let mut out = String::with_capacity(64 + headers.len() * 40);

    out.push_str(&start_line(message));
    out.push('\n');
    for header in headers {
        out.push_str(&format!("{}: {}\n", header.name, header.value));
    }
    out
}

/// Render a recorded event stream, one event per line.
///
/// Data events show their buffer offset and the escaped span bytes.
pub fn format_events(events: &[RecordedEvent]) -> String {
    let mut out = String::with_capacity(events.len() * 32);
    for recorded in events {
        match (&recorded.data, recorded.offset) {
            (Some(data), Some(offset)) => out.push_str(&format!(
                "on_{} @{offset}: \"{}\"\n",
                recorded.event,
                data.escape_ascii()
            )),
            _ => out.push_str(&format!("on_{}\n", recorded.event)),
        }
    }
    out
}
