//! POST body handling: urlencoded forms and multipart file uploads.

use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use weblog::{debug, info, warn};

use crate::config::{LocationConfig, ServerConfig};
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, error_response};
use crate::prelude::{HTTP_BAD_REQUEST, HTTP_OK, HTTP_PAYLOAD_TOO_LARGE};
use crate::utils::{find_subsequence, url_decode};

const ALLOWED_EXTENSIONS: &[&str] = &[
    ".txt", ".html", ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".pdf", ".ico",
];

/// One decoded `multipart/form-data` part.
#[derive(Debug, Default)]
pub struct FormField {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub value: Vec<u8>,
    pub is_file: bool,
}

pub fn handle_post(
    request: &HttpRequest,
    location: &LocationConfig,
    server: &ServerConfig,
) -> HttpResponse {
    // Chunked bodies carry no Content-Length, so the accumulated body
    // length backs the limit check for them.
    let body_size = request.content_length.max(request.body.len());
    if body_size > server.client_max_body_size {
        warn!("request body too large: {} bytes", body_size);
        return error_response(HTTP_PAYLOAD_TOO_LARGE, Some(server));
    }

    let content_type = request.header("content-type").unwrap_or("");

    if content_type.contains("multipart/form-data") {
        handle_file_upload(request, location, server, content_type)
    } else if content_type.contains("application/x-www-form-urlencoded") {
        handle_form_data(request)
    } else {
        debug!("unsupported content type: {}", content_type);
        error_response(HTTP_BAD_REQUEST, Some(server))
    }
}

fn handle_form_data(request: &HttpRequest) -> HttpResponse {
    let body = String::from_utf8_lossy(&request.body);
    let fields = parse_urlencoded(&body);

    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><title>Form Data Received</title></head><body>\n\
         <h1>Form Data Received</h1>\n<h2>Posted Data:</h2>\n<ul>\n",
    );
    for (key, value) in &fields {
        html.push_str(&format!("<li><strong>{}:</strong> {}</li>\n", key, value));
    }
    html.push_str("</ul>\n<p><a href=\"/\">Back to home</a></p>\n</body></html>\n");

    info!("processed form data with {} fields", fields.len());
    let mut response = HttpResponse::new(HTTP_OK);
    response.set_body(html.into_bytes());
    response
}

/// `a=b&c=d` pairs; `+` becomes space in values before percent-decoding.
pub fn parse_urlencoded(body: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();

    for pair in body.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.replace('+', " ");
        fields.push((url_decode(key), url_decode(&value)));
    }

    fields
}

fn handle_file_upload(
    request: &HttpRequest,
    location: &LocationConfig,
    server: &ServerConfig,
    content_type: &str,
) -> HttpResponse {
    if location.upload_path.is_empty() || request.body.is_empty() {
        return upload_error_page("Invalid upload request");
    }

    let Some(boundary) = extract_boundary(content_type) else {
        return upload_error_page("No boundary in multipart data");
    };

    let fields = parse_multipart(&request.body, &boundary);

    // A non-file "description" field renames every uploaded file,
    // keeping each file's own extension.
    let custom_name = fields
        .iter()
        .find(|f| !f.is_file && f.name == "description")
        .map(|f| String::from_utf8_lossy(&f.value).trim().to_string())
        .filter(|name| !name.is_empty());

    let mut saved = Vec::new();

    for field in fields.iter().filter(|f| f.is_file) {
        let Some(original) = field.filename.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };

        let mut final_name = match &custom_name {
            Some(base) => {
                let extension = original.rfind('.').map(|p| &original[p..]).unwrap_or("");
                format!("{}{}", base, extension)
            }
            None => original.to_string(),
        };
        final_name = final_name.replace(' ', "_");

        if !is_allowed_file_type(&final_name) {
            warn!("file type not allowed: {}", final_name);
            continue;
        }

        if field.value.len() > server.client_max_body_size {
            warn!("file too large, skipped: {}", final_name);
            continue;
        }

        match save_uploaded_file(&field.value, &final_name, &location.upload_path) {
            Ok(stored) => {
                info!("uploaded {}", stored);
                saved.push(stored);
            }
            Err(e) => warn!("failed to save {}: {}", final_name, e),
        }
    }

    if saved.is_empty() {
        return upload_error_page("No files were uploaded");
    }

    upload_success_page(&saved)
}

pub fn extract_boundary(content_type: &str) -> Option<String> {
    let boundary = content_type.split("boundary=").nth(1)?.trim();
    let boundary = boundary.strip_prefix('"').unwrap_or(boundary);
    let boundary = boundary.strip_suffix('"').unwrap_or(boundary);
    if boundary.is_empty() {
        None
    } else {
        Some(boundary.to_string())
    }
}

/// Splits the body at every `--<boundary>` occurrence. Each part is
/// `headers CRLF CRLF data`, where data excludes the CRLF that precedes
/// the next boundary.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Vec<FormField> {
    let marker = format!("--{}", boundary);
    let marker = marker.as_bytes();

    let mut positions = Vec::new();
    let mut pos = 0;
    while let Some(found) = find_subsequence(body, marker, pos) {
        positions.push(found);
        pos = found + marker.len();
    }

    let mut fields = Vec::new();
    for window in positions.windows(2) {
        let mut start = window[0] + marker.len();
        let mut end = window[1];

        if body.get(start..start + 2) == Some(b"\r\n") {
            start += 2;
        }
        if end >= 2 && body.get(end - 2..end) == Some(b"\r\n") {
            end -= 2;
        }
        if start >= end {
            continue;
        }

        if let Some(field) = parse_form_field(&body[start..end]) {
            fields.push(field);
        }
    }

    fields
}

fn parse_form_field(part: &[u8]) -> Option<FormField> {
    let header_end = find_subsequence(part, b"\r\n\r\n", 0)?;
    let headers = String::from_utf8_lossy(&part[..header_end]);
    let data = &part[header_end + 4..];

    let mut field = FormField {
        value: data.to_vec(),
        ..FormField::default()
    };

    for line in headers.lines() {
        if let Some(rest) = line.strip_prefix("Content-Disposition:") {
            for attr in rest.split(';') {
                let attr = attr.trim();
                if let Some(name) = attr.strip_prefix("name=") {
                    field.name = name.trim_matches('"').to_string();
                } else if let Some(filename) = attr.strip_prefix("filename=") {
                    let filename = filename.trim_matches('"').to_string();
                    field.is_file = !filename.is_empty();
                    field.filename = Some(filename);
                }
            }
        } else if let Some(rest) = line.strip_prefix("Content-Type:") {
            field.content_type = Some(rest.trim().to_string());
        }
    }

    if field.name.is_empty() {
        None
    } else {
        Some(field)
    }
}

pub fn is_allowed_file_type(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn save_uploaded_file(data: &[u8], filename: &str, upload_path: &str) -> std::io::Result<String> {
    let dir = Path::new(upload_path);
    if !dir.is_dir() {
        fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)?;
    }

    let target = unique_path(dir, filename);
    fs::write(&target, data)?;

    Ok(target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string()))
}

/// Collision-free naming: `name.ext`, then `name_1.ext`, `name_2.ext`, …
/// Never overwrites a pre-existing file.
pub fn unique_path(directory: &Path, filename: &str) -> PathBuf {
    let mut full_path = directory.join(filename);
    let mut counter = 1;

    while full_path.exists() {
        let (stem, extension) = match filename.rfind('.') {
            Some(pos) => (&filename[..pos], &filename[pos..]),
            None => (filename, ""),
        };
        full_path = directory.join(format!("{}_{}{}", stem, counter, extension));
        counter += 1;
    }

    full_path
}

fn upload_success_page(saved: &[String]) -> HttpResponse {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><title>Upload Successful</title></head><body>\n\
         <h1>Files Uploaded Successfully!</h1>\n<h2>Uploaded Files:</h2>\n<ul>\n",
    );
    for name in saved {
        html.push_str(&format!("<li>{}</li>\n", name));
    }
    html.push_str("</ul>\n<p><a href=\"/\">Back to home</a></p>\n</body></html>\n");

    let mut response = HttpResponse::new(HTTP_OK);
    response.set_body(html.into_bytes());
    response
}

fn upload_error_page(cause: &str) -> HttpResponse {
    let html = format!(
        "<!DOCTYPE html>\n<html><head><title>Upload Error</title></head><body>\n\
         <h1>Upload Failed</h1>\n<p>Error: {}</p>\n\
         <p><a href=\"/\">Back to home</a></p>\n</body></html>\n",
        cause
    );

    let mut response = HttpResponse::new(HTTP_BAD_REQUEST);
    response.set_body(html.into_bytes());
    response
}
