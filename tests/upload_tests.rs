use std::fs;

use tempfile::tempdir;

use webserv::config::{LocationConfig, ServerConfig};
use webserv::http::{HttpParser, HttpRequest};
use webserv::upload::{
    extract_boundary, handle_post, is_allowed_file_type, parse_multipart, parse_urlencoded,
    unique_path,
};

fn multipart_request(body: &[u8], boundary: &str) -> HttpRequest {
    let head = format!(
        "POST /upload HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data; boundary={}\r\nContent-Length: {}\r\n\r\n",
        boundary,
        body.len()
    );
    let mut raw = head.into_bytes();
    raw.extend_from_slice(body);

    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();
    parser.feed(&mut req, &raw).expect("request must parse");
    req
}

fn upload_location(dir: &str) -> LocationConfig {
    LocationConfig {
        path: "/upload".to_string(),
        methods: vec!["POST".to_string()],
        upload_path: dir.to_string(),
        ..LocationConfig::default()
    }
}

fn body_with_file(boundary: &str, description: Option<&str>, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(desc) = description {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{d}\r\n",
                b = boundary,
                d = desc
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = boundary,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[test]
fn boundary_extraction() {
    assert_eq!(
        extract_boundary("multipart/form-data; boundary=xyz"),
        Some("xyz".to_string())
    );
    assert_eq!(
        extract_boundary("multipart/form-data; boundary=\"quoted\""),
        Some("quoted".to_string())
    );
    assert_eq!(extract_boundary("multipart/form-data"), None);
}

#[test]
fn multipart_parts_are_decoded() {
    let body = body_with_file("B", Some("my photo"), "x.png", b"PNGDATA");
    let fields = parse_multipart(&body, "B");

    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "description");
    assert!(!fields[0].is_file);
    assert_eq!(fields[0].value, b"my photo");

    assert_eq!(fields[1].name, "file");
    assert!(fields[1].is_file);
    assert_eq!(fields[1].filename.as_deref(), Some("x.png"));
    assert_eq!(fields[1].value, b"PNGDATA");
}

#[test]
fn binary_part_bodies_survive_crlf_content() {
    // Payload containing CRLF pairs must come through byte-exact.
    let payload = b"line1\r\nline2\r\n\r\nline3";
    let body = body_with_file("bnd", None, "x.txt", payload);
    let fields = parse_multipart(&body, "bnd");

    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].value, payload);
}

#[test]
fn description_renames_file_preserving_extension() {
    let dir = tempdir().unwrap();
    let location = upload_location(dir.path().to_str().unwrap());
    let server = ServerConfig::default();

    let body = body_with_file("B", Some("my photo"), "x.png", b"PNGDATA");
    let req = multipart_request(&body, "B");

    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 200);

    let saved = dir.path().join("my_photo.png");
    assert_eq!(fs::read(saved).unwrap(), b"PNGDATA");
}

#[test]
fn collision_gets_numbered_suffix() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"old").unwrap();
    fs::write(dir.path().join("a_1.txt"), b"older").unwrap();

    let target = unique_path(dir.path(), "a.txt");
    assert_eq!(target.file_name().unwrap(), "a_2.txt");

    // Saving through the handler must not clobber what exists.
    let location = upload_location(dir.path().to_str().unwrap());
    let server = ServerConfig::default();
    let body = body_with_file("B", None, "a.txt", b"new");
    let req = multipart_request(&body, "B");

    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 200);
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"old");
    assert_eq!(fs::read(dir.path().join("a_2.txt")).unwrap(), b"new");
}

#[test]
fn disallowed_extension_is_rejected() {
    assert!(is_allowed_file_type("notes.txt"));
    assert!(is_allowed_file_type("PHOTO.JPG"));
    assert!(!is_allowed_file_type("payload.exe"));
    assert!(!is_allowed_file_type("script.sh"));

    let dir = tempdir().unwrap();
    let location = upload_location(dir.path().to_str().unwrap());
    let server = ServerConfig::default();

    let body = body_with_file("B", None, "evil.exe", b"MZ");
    let req = multipart_request(&body, "B");

    // Nothing saved, so the upload reports failure.
    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 400);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn body_over_limit_yields_413() {
    let dir = tempdir().unwrap();
    let location = upload_location(dir.path().to_str().unwrap());
    let server = ServerConfig {
        client_max_body_size: 64,
        ..ServerConfig::default()
    };

    let body = body_with_file("B", None, "big.txt", &[b'x'; 256]);
    let req = multipart_request(&body, "B");

    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 413);
}

#[test]
fn body_exactly_at_limit_is_accepted() {
    let dir = tempdir().unwrap();
    let location = upload_location(dir.path().to_str().unwrap());

    let body = body_with_file("B", None, "edge.txt", b"abc");
    let server = ServerConfig {
        client_max_body_size: body.len(),
        ..ServerConfig::default()
    };
    let req = multipart_request(&body, "B");

    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 200);
}

#[test]
fn urlencoded_form_is_acknowledged() {
    let dir = tempdir().unwrap();
    let location = upload_location(dir.path().to_str().unwrap());
    let server = ServerConfig::default();

    let body = b"name=Jo+Smith&city=Paris%21";
    let head = format!(
        "POST /upload HTTP/1.1\r\nHost: x\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let mut raw = head.into_bytes();
    raw.extend_from_slice(body);

    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();
    parser.feed(&mut req, &raw).unwrap();

    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 200);

    let page = String::from_utf8_lossy(&response.body).into_owned();
    assert!(page.contains("Jo Smith"));
    assert!(page.contains("Paris!"));
}

#[test]
fn urlencoded_pairs_decode() {
    let fields = parse_urlencoded("a=1&b=two+words&c=%2Fpath");
    assert_eq!(fields[0], ("a".to_string(), "1".to_string()));
    assert_eq!(fields[1], ("b".to_string(), "two words".to_string()));
    assert_eq!(fields[2], ("c".to_string(), "/path".to_string()));
}

#[test]
fn unsupported_content_type_yields_400() {
    let dir = tempdir().unwrap();
    let location = upload_location(dir.path().to_str().unwrap());
    let server = ServerConfig::default();

    let raw = b"POST /upload HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
    let mut parser = HttpParser::new();
    let mut req = HttpRequest::new();
    parser.feed(&mut req, raw.as_slice()).unwrap();

    let response = handle_post(&req, &location, &server);
    assert_eq!(response.status, 400);
}
