use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
    Put,
    Unknown,
}

impl Method {
    pub fn from_token(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "DELETE" => Method::Delete,
            "PUT" => Method::Put,
            _ => Method::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Put => "PUT",
            Method::Unknown => "UNKNOWN",
        }
    }

    pub fn is_allowed(&self, allowed: &[String]) -> bool {
        allowed.iter().any(|m| m == self.as_str())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
    Unknown,
}

impl HttpVersion {
    pub fn from_token(token: &str) -> HttpVersion {
        match token {
            "HTTP/1.0" => HttpVersion::Http10,
            "HTTP/1.1" => HttpVersion::Http11,
            _ => HttpVersion::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
            HttpVersion::Unknown => "HTTP/UNKNOWN",
        }
    }
}

/// A request under construction by the parser; read-only afterwards.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    pub query_string: String,
    pub version: HttpVersion,
    /// Lowercased names; a repeated header overwrites the earlier value.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub content_length: usize,
    pub is_chunked: bool,
    pub chunked_complete: bool,
    pub is_complete: bool,
    pub is_valid: bool,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        HttpRequest {
            method: Method::Unknown,
            uri: String::new(),
            query_string: String::new(),
            version: HttpVersion::Unknown,
            headers: HashMap::new(),
            body: Vec::new(),
            content_length: 0,
            is_chunked: false,
            chunked_complete: false,
            is_complete: false,
            is_valid: false,
        }
    }

    pub fn clear(&mut self) {
        *self = HttpRequest::new();
    }

    /// Stores the request target, moving anything after the first `?`
    /// into the query string.
    pub fn set_uri(&mut self, target: &str) {
        match target.find('?') {
            Some(pos) => {
                self.uri = target[..pos].to_string();
                self.query_string = target[pos + 1..].to_string();
            }
            None => {
                self.uri = target.to_string();
                self.query_string.clear();
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers
            .insert(name.to_ascii_lowercase(), value.trim().to_string());
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)?;
        if !self.query_string.is_empty() {
            write!(f, "?{}", self.query_string)?;
        }
        write!(f, " {}", self.version.as_str())
    }
}
