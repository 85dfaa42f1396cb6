use webserv::http::{HttpParser, HttpRequest, ParseError, ParseStatus};

fn chunked_head(uri: &str) -> Vec<u8> {
    format!(
        "POST {} HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n",
        uri
    )
    .into_bytes()
}

#[test]
fn decodes_simple_chunked_body() {
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();

    let mut data = chunked_head("/upload");
    data.extend_from_slice(b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");

    assert_eq!(parser.feed(&mut req, &data), Ok(ParseStatus::Complete));
    assert!(req.is_chunked);
    assert!(req.chunked_complete);
    assert_eq!(req.body, b"hello world");
}

#[test]
fn no_framing_bytes_leak_into_body() {
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();

    let mut data = chunked_head("/upload");
    data.extend_from_slice(b"4\r\nAAAA\r\n4\r\nBBBB\r\n0\r\n\r\n");
    parser.feed(&mut req, &data).unwrap();

    assert_eq!(req.body, b"AAAABBBB");
}

#[test]
fn resumes_at_any_byte_split() {
    // The same frame stream fed one byte at a time must produce the
    // same body.
    let mut data = chunked_head("/upload");
    data.extend_from_slice(b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");

    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();
    let mut last = ParseStatus::NeedMore;

    for byte in &data {
        last = parser.feed(&mut req, std::slice::from_ref(byte)).unwrap();
    }

    assert_eq!(last, ParseStatus::Complete);
    assert_eq!(req.body, b"hello world");
}

#[test]
fn split_inside_size_line_and_terminator() {
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();

    parser.feed(&mut req, &chunked_head("/upload")).unwrap();
    assert_eq!(parser.feed(&mut req, b"A"), Ok(ParseStatus::NeedMore));
    assert_eq!(parser.feed(&mut req, b"\r\n"), Ok(ParseStatus::NeedMore));

    let ten_a = vec![b'a'; 10];
    assert_eq!(parser.feed(&mut req, &ten_a), Ok(ParseStatus::NeedMore));
    assert_eq!(parser.feed(&mut req, b"\r\n0\r\n"), Ok(ParseStatus::NeedMore));
    assert_eq!(parser.feed(&mut req, b"\r\n"), Ok(ParseStatus::Complete));

    assert_eq!(req.body, ten_a);
}

#[test]
fn chunk_extension_is_dropped() {
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();

    let mut data = chunked_head("/upload");
    data.extend_from_slice(b"5;name=value\r\nhello\r\n0\r\n\r\n");
    parser.feed(&mut req, &data).unwrap();

    assert_eq!(req.body, b"hello");
}

#[test]
fn non_hex_size_line_is_an_error() {
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();

    let mut data = chunked_head("/upload");
    data.extend_from_slice(b"zz\r\nhello\r\n0\r\n\r\n");

    assert_eq!(
        parser.feed(&mut req, &data),
        Err(ParseError::InvalidChunkSize)
    );
    assert!(parser.has_error());
}

#[test]
fn trailers_are_consumed_with_the_terminator() {
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();

    let mut data = chunked_head("/upload");
    data.extend_from_slice(b"2\r\nok\r\n0\r\nX-Checksum: abc\r\n\r\n");

    assert_eq!(parser.feed(&mut req, &data), Ok(ParseStatus::Complete));
    assert_eq!(req.body, b"ok");
}
