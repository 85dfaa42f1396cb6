pub mod nginx;
pub mod validate;
pub mod yaml;

use core::fmt;
use std::collections::HashMap;
use std::error::Error;

use crate::error::Result;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_NAME: &str = "localhost";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576; // 1 MiB
pub const DEFAULT_ROOT: &str = "./www";
pub const DEFAULT_INDEX: &str = "index.html";

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub line: Option<usize>,
}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self {
            message,
            line: None,
        }
    }

    pub fn at(message: String, line: usize) -> Self {
        Self {
            message,
            line: Some(line),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

impl Error for ConfigError {}

/// One routing rule attached to a URI prefix.
#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub path: String,
    pub root: String,
    pub index: String,
    pub methods: Vec<String>,
    pub upload_path: String,
    pub autoindex: bool,
    pub cgi_enabled: bool,
    pub cgi_extension: String,
    pub cgi_path: String,
    pub redirect: Option<(u16, String)>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            root: DEFAULT_ROOT.to_string(),
            index: DEFAULT_INDEX.to_string(),
            methods: vec!["GET".to_string(), "POST".to_string()],
            upload_path: String::new(),
            autoindex: false,
            cgi_enabled: false,
            cgi_extension: String::new(),
            cgi_path: String::new(),
            redirect: None,
        }
    }
}

/// One listening server; immutable after load.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub server_name: String,
    pub client_max_body_size: usize,
    pub error_pages: HashMap<u16, String>,
    pub locations: Vec<LocationConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut error_pages = HashMap::new();
        error_pages.insert(403, "./errors/403.html".to_string());
        error_pages.insert(404, "./errors/404.html".to_string());
        error_pages.insert(500, "./errors/500.html".to_string());

        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
            error_pages,
            locations: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Longest-prefix location match. A prefix only matches at a `/`
    /// segment boundary, so `/upload` does not capture `/uploads`.
    pub fn find_location(&self, path: &str) -> Option<&LocationConfig> {
        let mut best: Option<&LocationConfig> = None;
        let mut best_len = 0;

        for location in &self.locations {
            let matches = path == location.path
                || (path.starts_with(&location.path)
                    && (location.path == "/"
                        || path.as_bytes().get(location.path.len()) == Some(&b'/')));

            if matches && location.path.len() > best_len {
                best = Some(location);
                best_len = location.path.len();
            }
        }

        best
    }

    pub fn is_method_allowed(&self, path: &str, method: &str) -> bool {
        match self.find_location(path) {
            Some(location) => location.methods.iter().any(|m| m == method),
            None => false,
        }
    }

    pub fn error_page(&self, status: u16) -> Option<&str> {
        self.error_pages.get(&status).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub servers: Vec<ServerConfig>,
}

impl AppConfig {
    /// Loads and validates a config file. The dialect is chosen by
    /// extension: `.yml`/`.yaml` parse as YAML, anything else as the
    /// nginx-like block syntax.
    pub fn load(path: &str) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::new(format!("cannot read {}: {}", path, e)))?;

        let config = if is_yaml_file(path) {
            yaml::parse(&content)?
        } else {
            nginx::parse(&content)?
        };

        Ok(validate::validate(config)?)
    }
}

pub fn is_yaml_file(path: &str) -> bool {
    path.ends_with(".yml") || path.ends_with(".yaml")
}

/// Parses a size value that may carry an `M`/`m` (mebibyte) suffix.
pub fn parse_body_size(value: &str) -> Option<usize> {
    let value = value.trim();
    if let Some(number) = value.strip_suffix(['M', 'm']) {
        number.trim().parse::<usize>().ok().map(|n| n * 1_048_576)
    } else {
        value.parse::<usize>().ok()
    }
}

/// Parses a redirect directive value: either `<status> <url>` or a bare
/// URL, which defaults to 302.
pub fn parse_redirect(value: &str) -> Option<(u16, String)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut parts = value.splitn(2, char::is_whitespace);
    let first = parts.next()?;
    match parts.next() {
        Some(target) => {
            let code = first.parse::<u16>().ok()?;
            Some((code, target.trim().to_string()))
        }
        None => Some((302, first.to_string())),
    }
}
