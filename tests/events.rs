use spanwire::{
    Callbacks, Context, Control, ErrorKind, Event, EventRecorder, MessageMode, ParseStatus, Parser,
    ParserConfig, Span, Upgrade,
};

type Merged = Vec<(Event, Option<Vec<u8>>)>;

fn recorder(mode: MessageMode) -> Parser<'static, EventRecorder> {
    Parser::new(mode, &EventRecorder::CALLBACKS, EventRecorder::new())
}

fn data(event: Event, bytes: &str) -> (Event, Option<Vec<u8>>) {
    (event, Some(bytes.as_bytes().to_vec()))
}

fn note(event: Event) -> (Event, Option<Vec<u8>>) {
    (event, None)
}

fn body_of(parser: &Parser<'_, EventRecorder>) -> Vec<u8> {
    parser
        .data
        .events()
        .iter()
        .filter(|e| e.event == Event::Body)
        .filter_map(|e| e.data.clone())
        .flatten()
        .collect()
}

fn count(parser: &Parser<'_, EventRecorder>, event: Event) -> usize {
    parser.data.events().iter().filter(|e| e.event == event).count()
}

// =========================================================================
// Event sequences
// =========================================================================

#[test_log::test]
fn simple_request_event_sequence() {
    let mut parser = recorder(MessageMode::Request);
    let raw = b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n";
    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Consumed(raw.len()));

    let expected: Merged = vec![
        note(Event::MessageBegin),
        data(Event::Method, "GET"),
        note(Event::MethodComplete),
        data(Event::Url, "/x"),
        note(Event::UrlComplete),
        data(Event::Version, "HTTP/1.1"),
        note(Event::VersionComplete),
        data(Event::HeaderField, "Host"),
        note(Event::HeaderFieldComplete),
        data(Event::HeaderValue, "a"),
        note(Event::HeaderValueComplete),
        note(Event::HeadersComplete),
        note(Event::MessageComplete),
    ];
    assert_eq!(parser.data.merged(), expected);

    assert!(!parser.needs_eof());
    assert_eq!(parser.content_length(), Some(0));
    assert!(parser.should_keep_alive());
    assert_eq!((parser.http_major(), parser.http_minor()), (1, 1));
}

#[test]
fn simple_response_event_sequence() {
    let mut parser = recorder(MessageMode::Response);
    let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
    parser.execute(raw).unwrap();

    let expected: Merged = vec![
        note(Event::MessageBegin),
        data(Event::Version, "HTTP/1.1"),
        note(Event::VersionComplete),
        data(Event::Status, "OK"),
        note(Event::StatusComplete),
        data(Event::HeaderField, "Content-Length"),
        note(Event::HeaderFieldComplete),
        data(Event::HeaderValue, "5"),
        note(Event::HeaderValueComplete),
        note(Event::HeadersComplete),
        data(Event::Body, "hello"),
        note(Event::MessageComplete),
    ];
    assert_eq!(parser.data.merged(), expected);
    assert_eq!(parser.status_code(), 200);
}

#[test]
fn spans_point_into_each_buffer() {
    let mut parser = recorder(MessageMode::Request);
    parser.execute(b"GET /ab").unwrap();
    parser.execute(b"cd HTTP/1.1\r\n\r\n").unwrap();

    let urls: Vec<_> = parser
        .data
        .events()
        .iter()
        .filter(|e| e.event == Event::Url)
        .map(|e| (e.data.clone().unwrap(), e.offset.unwrap()))
        .collect();
    assert_eq!(urls, [(b"/ab".to_vec(), 4), (b"cd".to_vec(), 0)]);
    // Fragments come before the single completion.
    assert_eq!(count(&parser, Event::UrlComplete), 1);
}

#[test]
fn header_value_span_excludes_leading_whitespace() {
    let mut parser = recorder(MessageMode::Request);
    parser.execute(b"GET / HTTP/1.1\r\nX-A:  \t v\r\nX-B:\r\n\r\n").unwrap();
    let values: Merged = parser
        .data
        .merged()
        .into_iter()
        .filter(|(e, _)| matches!(e, Event::HeaderValue | Event::HeaderValueComplete))
        .collect();
    assert_eq!(
        values,
        [
            data(Event::HeaderValue, "v"),
            note(Event::HeaderValueComplete),
            note(Event::HeaderValueComplete),
        ]
    );
}

#[test]
fn chunk_extensions_and_trailers() {
    let mut parser = recorder(MessageMode::Request);
    let raw = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                5;a=1;b=\"x y\"\r\nhello\r\n0\r\nX-T: 1\r\n\r\n";
    parser.execute(raw).unwrap();

    let merged = parser.data.merged();
    let start = merged
        .iter()
        .position(|(e, _)| *e == Event::HeadersComplete)
        .unwrap();
    let expected: Merged = vec![
        note(Event::HeadersComplete),
        data(Event::ChunkExtensionName, "a"),
        note(Event::ChunkExtensionNameComplete),
        data(Event::ChunkExtensionValue, "1"),
        note(Event::ChunkExtensionValueComplete),
        data(Event::ChunkExtensionName, "b"),
        note(Event::ChunkExtensionNameComplete),
        data(Event::ChunkExtensionValue, "\"x y\""),
        note(Event::ChunkExtensionValueComplete),
        note(Event::ChunkHeader),
        data(Event::Body, "hello"),
        note(Event::ChunkComplete),
        note(Event::ChunkHeader),
        data(Event::HeaderField, "X-T"),
        note(Event::HeaderFieldComplete),
        data(Event::HeaderValue, "1"),
        note(Event::HeaderValueComplete),
        note(Event::ChunkComplete),
        note(Event::MessageComplete),
    ];
    assert_eq!(merged[start..], expected[..]);
}

// =========================================================================
// Pause / resume
// =========================================================================

fn pause_at_headers(_cx: &mut Context<'_, EventRecorder>) -> Control {
    Control::Pause
}

#[test_log::test]
fn pause_at_headers_complete_consumes_no_body() {
    let callbacks = Callbacks {
        on_headers_complete: Some(pause_at_headers),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
    let head = raw.len() - 3;

    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Paused(head));
    assert!(parser.is_paused());
    assert!(body_of(&parser).is_empty());

    let err = parser.execute(&raw[head..]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Paused);
    assert!(parser.error().is_none());

    parser.resume();
    assert_eq!(parser.execute(&raw[head..]).unwrap(), ParseStatus::Consumed(3));
    assert_eq!(body_of(&parser), b"abc");
    assert_eq!(parser.messages_completed(), 1);
}

fn pause_on_body(_cx: &mut Context<'_, EventRecorder>, _span: Span<'_>) -> Control {
    Control::Pause
}

#[test]
fn pause_from_data_callback_flushes_and_stops_after_fragment() {
    let callbacks = Callbacks {
        on_body: Some(pause_on_body),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET / HTTP/1.1\r\n\r\n";

    let status = parser.execute(raw).unwrap();
    let ParseStatus::Paused(n) = status else {
        panic!("expected pause, got {status:?}");
    };
    assert_eq!(&raw[n..n + 3], b"GET");
    assert_eq!(parser.messages_completed(), 1);

    parser.resume();
    parser.execute(&raw[n..]).unwrap();
    assert_eq!(parser.messages_completed(), 2);
}

#[test]
fn external_pause_takes_effect_on_next_execute() {
    let mut parser = recorder(MessageMode::Request);
    parser.pause();
    assert_eq!(parser.execute(b"GET / HTTP/1.1\r\n\r\n").unwrap(), ParseStatus::Paused(0));
    assert!(parser.data.events().is_empty());
    parser.resume();
    assert!(matches!(
        parser.execute(b"GET / HTTP/1.1\r\n\r\n").unwrap(),
        ParseStatus::Consumed(_)
    ));
}

fn pause_here(_cx: &mut Context<'_, EventRecorder>) -> Control {
    Control::Pause
}

#[test_log::test]
fn pause_at_header_value_complete_stops_before_next_field() {
    let callbacks = Callbacks {
        on_header_value_complete: Some(pause_here),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    let raw = b"GET / HTTP/1.1\r\nA: b\r\nC: d\r\n\r\n";

    // The byte that ended the value is the `C` of the next field.
    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Paused(22));
    assert_eq!(
        parser.data.merged().last(),
        Some(&data(Event::HeaderValue, "b"))
    );
    assert_eq!(count(&parser, Event::HeaderField), 1);

    parser.resume();
    assert_eq!(parser.execute(&raw[22..]).unwrap(), ParseStatus::Paused(6));
    assert_eq!(
        parser.data.merged().last(),
        Some(&data(Event::HeaderValue, "d"))
    );
    assert_eq!(count(&parser, Event::HeadersComplete), 0);

    parser.resume();
    assert_eq!(parser.execute(&raw[28..]).unwrap(), ParseStatus::Consumed(2));
    assert_eq!(count(&parser, Event::HeaderField), 2);
    assert_eq!(count(&parser, Event::MessageComplete), 1);
}

#[test]
fn pause_at_headers_complete_holds_back_message_complete() {
    let callbacks = Callbacks {
        on_headers_complete: Some(pause_at_headers),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    let raw = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";

    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Paused(19));
    assert_eq!(
        parser.data.merged().last(),
        Some(&note(Event::VersionComplete))
    );
    assert_eq!(count(&parser, Event::MessageComplete), 0);

    parser.resume();
    assert_eq!(parser.execute(&raw[19..]).unwrap(), ParseStatus::Paused(19));
    assert_eq!(count(&parser, Event::MessageComplete), 1);
    assert_eq!(count(&parser, Event::Reset), 1);
    assert_eq!(
        parser.data.merged().last(),
        Some(&note(Event::VersionComplete))
    );

    parser.resume();
    assert_eq!(parser.execute(b"").unwrap(), ParseStatus::Consumed(0));
    assert_eq!(
        parser.data.merged().last(),
        Some(&note(Event::MessageComplete))
    );
    assert_eq!(count(&parser, Event::MessageComplete), 2);
}

#[test]
fn finish_delivers_held_back_message_complete() {
    let callbacks = Callbacks {
        on_headers_complete: Some(pause_at_headers),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    parser.execute(b"GET / HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(parser.finish().unwrap_err().kind(), ErrorKind::Paused);
    assert!(parser.error().is_none());

    parser.resume();
    parser.finish().unwrap();
    assert_eq!(count(&parser, Event::MessageComplete), 1);
}

#[test]
fn pause_at_message_begin_in_both_mode_holds_the_leading_h() {
    let callbacks = Callbacks {
        on_message_begin: Some(pause_here),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Both, &callbacks, EventRecorder::new());
    let raw = b"HTTP/1.1 204 No Content\r\n\r\n";

    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Paused(1));
    assert!(parser.data.events().is_empty());

    parser.resume();
    assert_eq!(
        parser.execute(&raw[1..]).unwrap(),
        ParseStatus::Consumed(raw.len() - 1)
    );
    let first = &parser.data.events()[0];
    assert_eq!(first.event, Event::Version);
    assert_eq!(first.data.as_deref(), Some(&b"H"[..]));
    assert_eq!(
        parser.data.merged()[0],
        data(Event::Version, "HTTP/1.1")
    );
    assert_eq!(parser.status_code(), 204);
    assert_eq!(parser.messages_completed(), 1);
}

#[test]
fn pause_at_message_complete_still_reports_the_upgrade() {
    let callbacks = Callbacks {
        on_message_complete: Some(pause_here),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    let raw = b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\nrest";
    let head = raw.len() - 4;

    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Paused(head));
    assert!(parser.is_upgrade());

    parser.resume();
    assert_eq!(parser.execute(&raw[head..]).unwrap(), ParseStatus::Upgraded(0));
    assert_eq!(parser.upgrade(), Some(Upgrade::Protocol));
    assert_eq!(
        parser.execute(&raw[head..]).unwrap_err().kind(),
        ErrorKind::PausedUpgrade
    );
}

// =========================================================================
// Skip body
// =========================================================================

fn skip_body(_cx: &mut Context<'_, EventRecorder>) -> Control {
    Control::SkipBody
}

#[test]
fn skip_body_treats_response_as_bodiless() {
    let callbacks = Callbacks {
        on_headers_complete: Some(skip_body),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Response, &callbacks, EventRecorder::new());
    // Response to HEAD: Content-Length describes a body that is not sent.
    let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n";
    parser.execute(raw).unwrap();

    assert_eq!(parser.messages_completed(), 2);
    assert_eq!(count(&parser, Event::Body), 0);
    assert_eq!(parser.status_code(), 204);
}

fn skip_from_url(_cx: &mut Context<'_, EventRecorder>, _span: Span<'_>) -> Control {
    Control::SkipBody
}

#[test]
fn skip_body_outside_headers_complete_is_an_error() {
    let callbacks = Callbacks {
        on_url: Some(skip_from_url),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());
    let err = parser.execute(b"GET /x HTTP/1.1\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Callback(Event::Url));
}

// =========================================================================
// Callback errors
// =========================================================================

fn reject_url(_cx: &mut Context<'_, EventRecorder>, _span: Span<'_>) -> Control {
    Control::Error
}

#[test]
fn callback_error_is_sticky_until_reset() {
    let callbacks = Callbacks {
        on_url: Some(reject_url),
        ..EventRecorder::CALLBACKS
    };
    let mut parser = Parser::new(MessageMode::Request, &callbacks, EventRecorder::new());

    let err = parser.execute(b"GET /x HTTP/1.1\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Callback(Event::Url));
    assert!(err.kind().is_callback());
    assert!(err.code() >= spanwire::CALLBACK_CODE_BASE);
    assert_eq!(err.offset(), 4);

    let again = parser.execute(b"anything").unwrap_err();
    assert_eq!(again, err);
    assert_eq!(parser.error(), Some(&err));

    parser.reset();
    assert!(parser.error().is_none());
    assert!(parser.execute(b"OPTIONS").is_ok());
}

#[test]
fn abort_stops_the_parser() {
    let mut parser = recorder(MessageMode::Request);
    parser.abort("idle timeout");
    let err = parser.execute(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.reason(), "idle timeout");
}

// =========================================================================
// Upgrades
// =========================================================================

#[test_log::test]
fn websocket_upgrade_returns_remaining_bytes() {
    let head: &[u8] = b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
    let raw = [head, b"\x81\x05hello"].concat();
    let mut parser = recorder(MessageMode::Request);

    assert_eq!(parser.execute(&raw).unwrap(), ParseStatus::Upgraded(head.len()));
    assert!(parser.is_upgrade());
    assert_eq!(parser.upgrade(), Some(Upgrade::Protocol));
    assert_eq!(count(&parser, Event::MessageComplete), 1);

    let err = parser.execute(&raw[head.len()..]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PausedUpgrade);
    assert!(parser.error().is_none());
}

#[test]
fn declined_upgrade_resumes_http_parsing() {
    let head: &[u8] = b"GET / HTTP/1.1\r\nUpgrade: h2c\r\nConnection: Upgrade\r\n\r\n";
    let raw = [head, b"GET /next HTTP/1.1\r\n\r\n"].concat();
    let mut parser = recorder(MessageMode::Request);

    let ParseStatus::Upgraded(n) = parser.execute(&raw).unwrap() else {
        panic!("expected upgrade");
    };
    parser.resume_after_upgrade();
    parser.execute(&raw[n..]).unwrap();
    assert_eq!(parser.messages_completed(), 2);
    assert_eq!(count(&parser, Event::Reset), 1);
}

#[test]
fn connect_request_switches_to_tunnel() {
    let head: &[u8] = b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n";
    let raw = [head, b"\x16\x03\x01"].concat();
    let mut parser = recorder(MessageMode::Request);

    assert_eq!(parser.execute(&raw).unwrap(), ParseStatus::Upgraded(head.len()));
    assert_eq!(parser.upgrade(), Some(Upgrade::Connect));
    assert_eq!(count(&parser, Event::Body), 0);
}

#[test]
fn http2_preface_stops_after_request_line() {
    let raw = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
    let mut parser = recorder(MessageMode::Request);

    assert_eq!(parser.execute(raw).unwrap(), ParseStatus::Upgraded(16));
    assert_eq!(parser.upgrade(), Some(Upgrade::H2Preface));
    assert_eq!(
        parser.execute(&raw[16..]).unwrap_err().kind(),
        ErrorKind::PausedH2Upgrade
    );
}

#[test]
fn switching_protocols_response_upgrades() {
    let head: &[u8] =
        b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
    let raw = [head, b"frame"].concat();
    let mut parser = recorder(MessageMode::Response);
    assert_eq!(parser.execute(&raw).unwrap(), ParseStatus::Upgraded(head.len()));
}

// =========================================================================
// Both mode
// =========================================================================

#[test]
fn both_mode_detects_response_split_after_h() {
    let mut parser = recorder(MessageMode::Both);
    assert_eq!(parser.execute(b"H").unwrap(), ParseStatus::Consumed(1));
    assert!(parser.data.events().is_empty());

    parser.execute(b"TTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").unwrap();
    assert_eq!(parser.status_code(), 200);
    let version: Merged = parser
        .data
        .merged()
        .into_iter()
        .filter(|(e, _)| *e == Event::Version)
        .collect();
    assert_eq!(version, [data(Event::Version, "HTTP/1.1")]);
}

#[test]
fn both_mode_accepts_head_request() {
    let mut parser = recorder(MessageMode::Both);
    parser.execute(b"HEAD / HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(parser.method(), Some(spanwire::Method::HEAD));
    let method = &parser.data.events()[1];
    assert_eq!(method.data.as_deref(), Some(b"HEAD".as_slice()));
    assert_eq!(method.offset, Some(0));
}

#[test]
fn both_mode_rejects_mixed_kinds() {
    let mut parser = recorder(MessageMode::Both);
    let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\nGET / HTTP/1.1\r\n\r\n";
    let err = parser.execute(raw).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SiblingMessageInProgress);
    assert_eq!(err.offset(), 38);
}

// =========================================================================
// Pipelining and keep-alive
// =========================================================================

#[test]
fn pipelined_messages_have_no_residual_state() {
    let mut parser = recorder(MessageMode::Request);
    let raw = b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /b HTTP/1.1\r\n\r\n";
    parser.execute(raw).unwrap();

    assert_eq!(parser.messages_completed(), 2);
    assert_eq!(parser.content_length(), Some(0));
    assert_eq!(body_of(&parser), b"hello");

    let events: Vec<Event> = parser.data.events().iter().map(|e| e.event).collect();
    let reset = events.iter().position(|e| *e == Event::Reset).unwrap();
    assert_eq!(events[reset - 1], Event::MessageComplete);
    assert_eq!(events[reset + 1], Event::MessageBegin);
}

#[test]
fn one_callback_table_serves_many_parsers() {
    let mut first = recorder(MessageMode::Request);
    let mut second = recorder(MessageMode::Request);
    first.execute(b"GET /1 HTTP/1.1\r\n\r\n").unwrap();
    second.execute(b"GET /22 HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(first.data.events()[3].data.as_deref(), Some(b"/1".as_slice()));
    assert_eq!(second.data.events()[3].data.as_deref(), Some(b"/22".as_slice()));
}

#[test]
fn data_after_connection_close_is_rejected() {
    let raw = b"GET / HTTP/1.0\r\n\r\nGET / HTTP/1.0\r\n\r\n";
    let mut parser = recorder(MessageMode::Request);
    let err = parser.execute(raw).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClosedConnection);
    assert_eq!(err.offset(), 18);

    let config = ParserConfig {
        lenient_keep_alive: true,
        ..ParserConfig::default()
    };
    let mut parser = Parser::with_config(
        MessageMode::Request,
        config,
        &EventRecorder::CALLBACKS,
        EventRecorder::new(),
    );
    parser.execute(raw).unwrap();
    assert_eq!(parser.messages_completed(), 2);
}

#[test]
fn http10_keep_alive_is_explicit() {
    let mut parser = recorder(MessageMode::Request);
    parser
        .execute(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();
    assert!(parser.should_keep_alive());
}

// =========================================================================
// Finish
// =========================================================================

#[test]
fn finish_completes_body_delimited_by_close() {
    let mut parser = recorder(MessageMode::Response);
    parser.execute(b"HTTP/1.1 200 OK\r\n\r\npartial").unwrap();
    assert!(parser.needs_eof());
    assert!(!parser.should_keep_alive());
    assert_eq!(parser.messages_completed(), 0);

    parser.finish().unwrap();
    assert_eq!(parser.messages_completed(), 1);
    assert_eq!(body_of(&parser), b"partial");
}

#[test]
fn finish_mid_body_fails() {
    let mut parser = recorder(MessageMode::Request);
    parser
        .execute(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
        .unwrap();
    let err = parser.finish().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClosedConnection);
}

// =========================================================================
// Grammar errors
// =========================================================================

#[test]
fn whitespace_before_colon_is_rejected_at_its_offset() {
    let mut parser = recorder(MessageMode::Request);
    let err = parser.execute(b"GET / HTTP/1.1\r\nHost : x\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHeaderToken);
    assert_eq!(err.offset(), 20);
    assert_eq!(parser.bytes_consumed(), 20);
}

#[test]
fn cr_without_lf_is_rejected() {
    let mut parser = recorder(MessageMode::Request);
    parser.execute(b"GET / HTTP/1.1\r\nX: y\r").unwrap();
    let err = parser.execute(b"z").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LfExpected);
    assert_eq!(err.offset(), 0);
}

#[test]
fn conflicting_framing_fails_before_any_body() {
    let mut parser = recorder(MessageMode::Request);
    let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n";
    let err = parser.execute(raw).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedContentLength);
    assert_eq!(count(&parser, Event::Body), 0);
    assert_eq!(count(&parser, Event::HeadersComplete), 0);
}

#[test]
fn invalid_chunk_size() {
    let mut parser = recorder(MessageMode::Request);
    let raw = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n";
    assert_eq!(
        parser.execute(raw).unwrap_err().kind(),
        ErrorKind::InvalidChunkSize
    );
}

#[test]
fn request_transfer_encoding_must_end_in_chunked() {
    let mut parser = recorder(MessageMode::Request);
    let raw = b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n";
    assert_eq!(
        parser.execute(raw).unwrap_err().kind(),
        ErrorKind::InvalidTransferEncoding
    );
}

#[test]
fn status_code_must_have_three_digits() {
    let mut parser = recorder(MessageMode::Response);
    let err = parser.execute(b"HTTP/1.1 20 OK\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStatus);
    assert_eq!(err.offset(), 11);
}

#[test]
fn wrong_protocol_name_is_an_invalid_constant() {
    let mut parser = recorder(MessageMode::Response);
    let err = parser.execute(b"HTTX/1.1 200 OK\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConstant);
    assert_eq!(ErrorKind::from_name(err.kind().name()), Some(err.kind()));
}

#[test]
fn unknown_versions_need_leniency() {
    let raw = b"GET / HTTP/1.2\r\n\r\n";
    let mut parser = recorder(MessageMode::Request);
    assert_eq!(parser.execute(raw).unwrap_err().kind(), ErrorKind::InvalidVersion);

    let config = ParserConfig {
        lenient_version: true,
        ..ParserConfig::default()
    };
    let mut parser = Parser::with_config(
        MessageMode::Request,
        config,
        &EventRecorder::CALLBACKS,
        EventRecorder::new(),
    );
    parser.execute(raw).unwrap();
    assert_eq!(parser.http_minor(), 2);
}
