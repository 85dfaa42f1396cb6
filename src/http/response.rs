use std::collections::HashMap;
use std::time::SystemTime;

use crate::config::ServerConfig;

pub const SERVER_SOFTWARE: &str = "Webserv/1.0";

/// Response under construction; serialized with [`to_bytes`](HttpResponse::to_bytes).
///
/// Header names are stored lowercased and written Pascal-Cased on the
/// wire. `Set-Cookie` is the one header allowed to accumulate; every
/// other name overwrites.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub status_message: String,
    pub headers: HashMap<String, String>,
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        let mut response = HttpResponse {
            status,
            status_message: Self::status_message(status).to_string(),
            headers: HashMap::new(),
            set_cookies: Vec::new(),
            body: Vec::new(),
        };
        response.set_default_headers();
        response
    }

    fn set_default_headers(&mut self) {
        self.headers
            .insert("server".to_string(), SERVER_SOFTWARE.to_string());
        self.headers
            .insert("date".to_string(), httpdate::fmt_http_date(SystemTime::now()));
        self.headers
            .insert("connection".to_string(), "close".to_string());
        self.headers.insert(
            "content-type".to_string(),
            "text/html; charset=UTF-8".to_string(),
        );
        self.headers
            .insert("content-length".to_string(), "0".to_string());
    }

    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self.status_message = Self::status_message(status).to_string();
        self
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        let lower = name.to_ascii_lowercase();
        if lower == "set-cookie" {
            self.set_cookies.push(value.to_string());
        } else {
            self.headers.insert(lower, value.to_string());
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    /// Replaces the body and keeps `Content-Length` in sync.
    pub fn set_body(&mut self, body: Vec<u8>) -> &mut Self {
        self.headers
            .insert("content-length".to_string(), body.len().to_string());
        self.body = body;
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.status_message).into_bytes();

        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", pascal_case(name), value).as_bytes());
        }
        for cookie in &self.set_cookies {
            out.extend_from_slice(format!("Set-Cookie: {}\r\n", cookie).as_bytes());
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    pub fn redirect(status: u16, target: &str) -> Self {
        let mut response = HttpResponse::new(status);
        response.set_header("Location", target);
        response.set_body(Vec::new());
        response
    }

    pub fn status_message(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Request Entity Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

fn pascal_case(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// Content type by lowercased extension after the last `.`.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=UTF-8",
        "css" => "text/css; charset=UTF-8",
        "js" => "application/javascript; charset=UTF-8",
        "txt" => "text/plain; charset=UTF-8",
        "json" => "application/json; charset=UTF-8",
        "xml" => "application/xml; charset=UTF-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Builds an error response: the configured error page for the status
/// when it exists and is readable, otherwise the built-in template.
pub fn error_response(status: u16, server: Option<&ServerConfig>) -> HttpResponse {
    let mut response = HttpResponse::new(status);

    if let Some(path) = server.and_then(|s| s.error_page(status)) {
        if let Ok(content) = std::fs::read(path) {
            response.set_body(content);
            return response;
        }
    }

    let body = default_error_page(status);
    response.set_body(body.into_bytes());
    response
}

fn default_error_page(status: u16) -> String {
    let message = HttpResponse::status_message(status);
    format!(
        "<!DOCTYPE html>\n<html><head>\n<title>{status} {message}</title>\n\
         <style>\nbody {{ font-family: Arial, sans-serif; text-align: center; margin: 100px; }}\n\
         h1 {{ color: #d32f2f; }}\np {{ color: #666; }}\n</style>\n</head><body>\n\
         <h1>{status} {message}</h1>\n\
         <p>The requested resource could not be found or accessed.</p>\n\
         <hr>\n<p><em>{server}</em></p>\n</body></html>\n",
        status = status,
        message = message,
        server = SERVER_SOFTWARE,
    )
}
