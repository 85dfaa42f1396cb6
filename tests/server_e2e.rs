//! End-to-end tests: a real server on a loopback port, driven by plain
//! `std::net::TcpStream` clients.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use webserv::config::{AppConfig, LocationConfig, ServerConfig};
use webserv::server::Server;

fn start_server(config: AppConfig) -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    thread::spawn(move || {
        let mut server = Server::new(config, flag).expect("server must bind");
        server.run().expect("server run failed");
    });

    // Give the listener a moment to come up.
    thread::sleep(Duration::from_millis(300));
    shutdown
}

fn exchange(port: u16, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect failed");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(raw).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read failed");
    String::from_utf8_lossy(&response).into_owned()
}

fn site_config(port: u16, www: &Path, upload: &Path) -> AppConfig {
    let root_location = LocationConfig {
        path: "/".to_string(),
        root: www.to_string_lossy().into_owned(),
        index: "index.html".to_string(),
        methods: vec!["GET".to_string()],
        ..LocationConfig::default()
    };

    let upload_location = LocationConfig {
        path: "/upload".to_string(),
        root: upload.to_string_lossy().into_owned(),
        index: String::new(),
        methods: vec!["GET".to_string(), "POST".to_string(), "DELETE".to_string()],
        upload_path: upload.to_string_lossy().into_owned(),
        autoindex: true,
        ..LocationConfig::default()
    };

    AppConfig {
        servers: vec![ServerConfig {
            port,
            locations: vec![root_location, upload_location],
            ..ServerConfig::default()
        }],
    }
}

#[test]
fn serves_static_files_and_errors() {
    let www = TempDir::new().unwrap();
    let upload = TempDir::new().unwrap();
    fs::write(www.path().join("index.html"), b"hi").unwrap();

    let port = 18201;
    start_server(site_config(port, www.path(), upload.path()));

    // Scenario: a plain static GET.
    let response = exchange(port, b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Length: 2\r\n"));
    assert!(response.contains("Server: Webserv/1.0\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.ends_with("\r\n\r\nhi"));

    // The index file also answers for the directory itself.
    let response = exchange(port, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    let response = exchange(port, b"GET /missing.html HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

    let response = exchange(port, b"GET /../etc/passwd HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));

    let response = exchange(port, b"DELETE /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));

    // A garbled request line turns into a 400 on the same connection.
    let response = exchange(port, b"NONSENSE\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[test]
fn upload_then_delete_lifecycle() {
    let www = TempDir::new().unwrap();
    let upload = TempDir::new().unwrap();

    let port = 18202;
    start_server(site_config(port, www.path(), upload.path()));

    // Multipart POST with a description field renaming the file.
    let body = b"--B\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nmy photo\r\n--B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"x.png\"\r\nContent-Type: image/png\r\n\r\nPNGBYTES\r\n--B--\r\n";
    let head = format!(
        "POST /upload HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data; boundary=B\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let mut raw = head.into_bytes();
    raw.extend_from_slice(body);

    let response = exchange(port, &raw);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("my_photo.png"));
    assert_eq!(
        fs::read(upload.path().join("my_photo.png")).unwrap(),
        b"PNGBYTES"
    );

    // The autoindex listing shows the stored file.
    let response = exchange(port, b"GET /upload HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("my_photo.png"));

    // First DELETE succeeds, the second sees nothing left.
    let response = exchange(port, b"DELETE /upload/my_photo.png HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(!upload.path().join("my_photo.png").exists());

    let response = exchange(port, b"DELETE /upload/my_photo.png HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[test]
fn chunked_post_and_stop_sentinel() {
    let www = TempDir::new().unwrap();
    let upload = TempDir::new().unwrap();

    let port = 18203;
    start_server(site_config(port, www.path(), upload.path()));

    // Chunked urlencoded POST reassembles into one body before routing.
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
        .write_all(
            b"POST /upload HTTP/1.1\r\nHost: x\r\n\
              Content-Type: application/x-www-form-urlencoded\r\n\
              Transfer-Encoding: chunked\r\n\r\n",
        )
        .unwrap();
    stream.write_all(b"6\r\nmsg=he\r\n").unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b"8\r\nllo+worl\r\n").unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b"1\r\nd\r\n0\r\n\r\n").unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    let response = String::from_utf8_lossy(&response).into_owned();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("hello world"));

    // /stop answers 200 and then brings the listener down.
    let response = exchange(port, b"GET /stop HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    thread::sleep(Duration::from_millis(500));
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
}
