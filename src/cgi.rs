//! CGI/1.1 execution: environment build, child spawn over socketpairs,
//! non-blocking body feed and output drain under a wall-clock budget.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use mio::{Events, Interest, Poll, Token};

use weblog::{debug, error, warn};

use crate::config::{LocationConfig, ServerConfig};
use crate::handlers::get_handler::{is_traversal, resolve_path, sanitize_path};
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, SERVER_SOFTWARE, error_response};
use crate::prelude::{
    CGI_POLL_INTERVAL, CGI_READ_CHUNK, CGI_TIMEOUT, HTTP_FORBIDDEN, HTTP_INTERNAL_SERVER_ERROR,
    HTTP_NOT_FOUND, HTTP_OK,
};
use crate::utils::find_subsequence;

pub fn handle_cgi(
    request: &HttpRequest,
    location: &LocationConfig,
    server: &ServerConfig,
    peer: Option<SocketAddr>,
) -> HttpResponse {
    let raw = resolve_path(&request.uri, location);
    if is_traversal(&request.uri) || is_traversal(&raw) {
        warn!("CGI traversal attempt: {}", request.uri);
        return error_response(HTTP_FORBIDDEN, Some(server));
    }

    let script = script_path(&request.uri, location);
    if !script.is_file() {
        warn!("CGI script not found: {}", script.display());
        return error_response(HTTP_NOT_FOUND, Some(server));
    }

    // SCRIPT_FILENAME must name the script absolutely on disk.
    let Ok(script_abs) = fs::canonicalize(&script) else {
        return error_response(HTTP_NOT_FOUND, Some(server));
    };

    let env = build_cgi_env(request, location, &script_abs, peer);

    match execute(request, location, &script_abs, env) {
        Ok(output) => parse_cgi_output(&output),
        Err(e) => {
            error!("CGI execution failed for {}: {}", script.display(), e);
            error_response(HTTP_INTERNAL_SERVER_ERROR, Some(server))
        }
    }
}

/// Splits a URI at the end of the script component: `SCRIPT_NAME` covers
/// up to and including the extension, `PATH_INFO` keeps any trailing
/// segments.
pub fn split_script_uri<'a>(uri: &'a str, extension: &str) -> (&'a str, &'a str) {
    if extension.is_empty() {
        return (uri, "");
    }

    let mut from = 0;
    while let Some(pos) = uri[from..].find(extension) {
        let end = from + pos + extension.len();
        if end == uri.len() || uri.as_bytes()[end] == b'/' {
            return (&uri[..end], &uri[end..]);
        }
        from = from + pos + 1;
    }

    (uri, "")
}

pub fn build_cgi_env(
    request: &HttpRequest,
    location: &LocationConfig,
    script_abs: &Path,
    peer: Option<SocketAddr>,
) -> Vec<(String, String)> {
    let (script_name, path_info) = split_script_uri(&request.uri, &location.cgi_extension);

    let mut env = vec![
        ("REQUEST_METHOD".to_string(), request.method.to_string()),
        (
            "SERVER_PROTOCOL".to_string(),
            request.version.as_str().to_string(),
        ),
        (
            "SCRIPT_FILENAME".to_string(),
            script_abs.to_string_lossy().into_owned(),
        ),
        ("SCRIPT_NAME".to_string(), script_name.to_string()),
        ("PATH_INFO".to_string(), path_info.to_string()),
        ("QUERY_STRING".to_string(), request.query_string.clone()),
        (
            "CONTENT_LENGTH".to_string(),
            request.content_length.to_string(),
        ),
        (
            "CONTENT_TYPE".to_string(),
            request.header("content-type").unwrap_or("").to_string(),
        ),
        ("SERVER_SOFTWARE".to_string(), SERVER_SOFTWARE.to_string()),
        ("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string()),
        (
            "SERVER_NAME".to_string(),
            request.header("host").unwrap_or("").to_string(),
        ),
        ("REDIRECT_STATUS".to_string(), "200".to_string()),
    ];

    if let Some(addr) = peer {
        env.push(("REMOTE_ADDR".to_string(), addr.ip().to_string()));
        env.push(("REMOTE_PORT".to_string(), addr.port().to_string()));
    }

    for (name, value) in &request.headers {
        let key = format!("HTTP_{}", name.to_uppercase().replace('-', "_"));
        env.push((key, value.clone()));
    }

    env
}

const STDIN_TOKEN: Token = Token(0);
const STDOUT_TOKEN: Token = Token(1);

/// Runs the interpreter on the script, feeding the request body to its
/// stdin and collecting stdout, without ever blocking longer than the
/// poll interval. Exceeding `CGI_TIMEOUT` kills and reaps the child.
fn execute(
    request: &HttpRequest,
    location: &LocationConfig,
    script: &Path,
    env: Vec<(String, String)>,
) -> std::io::Result<Vec<u8>> {
    // Two socketpairs stand in for the stdin/stdout pipes: the child
    // ends become its stdio, the parent ends stay non-blocking.
    let (parent_in, child_in) = UnixStream::pair()?;
    let (parent_out, child_out) = UnixStream::pair()?;
    parent_in.set_nonblocking(true)?;
    parent_out.set_nonblocking(true)?;

    let child_stdin = unsafe { fs::File::from_raw_fd(child_in.into_raw_fd()) };
    let child_stdout = unsafe { fs::File::from_raw_fd(child_out.into_raw_fd()) };

    let mut child = Command::new(&location.cgi_path)
        .arg(script)
        .envs(env)
        .stdin(Stdio::from(child_stdin))
        .stdout(Stdio::from(child_stdout))
        .stderr(Stdio::null())
        .spawn()?;

    debug!("CGI child spawned: {} {}", location.cgi_path, script.display());

    let mut stdin_stream = mio::net::UnixStream::from_std(parent_in);
    let mut stdout_stream = mio::net::UnixStream::from_std(parent_out);

    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(8);
    poll.registry()
        .register(&mut stdin_stream, STDIN_TOKEN, Interest::WRITABLE)?;
    poll.registry()
        .register(&mut stdout_stream, STDOUT_TOKEN, Interest::READABLE)?;

    let start = Instant::now();
    let overrun = |start: Instant| start.elapsed() > CGI_TIMEOUT;

    // Stream the whole body in, then close stdin so the child sees EOF.
    let mut sent = 0;
    while sent < request.body.len() {
        if overrun(start) {
            return kill_timed_out(&mut child);
        }
        match stdin_stream.write(&request.body[sent..]) {
            Ok(n) => sent += n,
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                let _ = poll.poll(&mut events, Some(CGI_POLL_INTERVAL));
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            // The child may exit or close stdin without reading it all.
            Err(ref e) if e.kind() == ErrorKind::BrokenPipe => break,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
    }
    let _ = poll.registry().deregister(&mut stdin_stream);
    drop(stdin_stream);

    // Drain stdout until EOF, waiting at most the poll interval per
    // idle turn.
    let mut output = Vec::new();
    let mut chunk = [0u8; CGI_READ_CHUNK];
    loop {
        if overrun(start) {
            return kill_timed_out(&mut child);
        }
        match stdout_stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => output.extend_from_slice(&chunk[..n]),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                let _ = poll.poll(&mut events, Some(CGI_POLL_INTERVAL));
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(std::io::Error::other("CGI exited with error"));
    }

    debug!("CGI produced {} bytes", output.len());
    Ok(output)
}

fn kill_timed_out(child: &mut std::process::Child) -> std::io::Result<Vec<u8>> {
    warn!("CGI timeout, killing process");
    let _ = child.kill();
    let _ = child.wait();
    Err(std::io::Error::other("CGI timed out"))
}

/// Splits CGI output into header block and body, honoring the `Status:`
/// pseudo-header. Output without a separator is all body.
pub fn parse_cgi_output(output: &[u8]) -> HttpResponse {
    let mut response = HttpResponse::new(HTTP_OK);

    let (header_block, body) = match find_subsequence(output, b"\r\n\r\n", 0) {
        Some(pos) => (&output[..pos], &output[pos + 4..]),
        None => match find_subsequence(output, b"\n\n", 0) {
            Some(pos) => (&output[..pos], &output[pos + 2..]),
            None => {
                response.set_body(output.to_vec());
                return response;
            }
        },
    };

    for line in String::from_utf8_lossy(header_block).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("status") {
            let code: String = value.chars().take(3).collect();
            if let Ok(status) = code.parse::<u16>() {
                response.set_status(status);
            }
        } else {
            response.set_header(name, value);
        }
    }

    response.set_body(body.to_vec());
    response
}

/// Resolved on-disk script path for a CGI URI, before canonicalization.
pub fn script_path(uri: &str, location: &LocationConfig) -> PathBuf {
    PathBuf::from(sanitize_path(&resolve_path(uri, location)))
}
