//! Nginx-like configuration dialect.
//!
//! ```text
//! server {
//!     listen 8080;
//!     host 127.0.0.1;
//!     server_name example;
//!     client_max_body_size 10M;
//!     error_page 404 ./errors/404.html;
//!     location /upload {
//!         root ./www;
//!         index index.html;
//!         methods GET POST DELETE;
//!         upload_path ./www/upload;
//!         autoindex on;
//!         cgi_extension .py;
//!         cgi_path /usr/bin/python3;
//!         return 301 /moved;
//!     }
//! }
//! ```

use super::{AppConfig, ConfigError, LocationConfig, ServerConfig, parse_body_size, parse_redirect};

type Line<'a> = (usize, &'a str);

pub fn parse(content: &str) -> Result<AppConfig, ConfigError> {
    // Comments and blank lines are dropped up front; original line
    // numbers are kept for error reporting.
    let lines: Vec<Line> = content
        .lines()
        .enumerate()
        .map(|(no, line)| (no + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let mut servers = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let (no, line) = lines[index];
        if is_block_start(line, "server") {
            index += 1;
            servers.push(parse_server_block(&lines, &mut index)?);
        } else {
            return Err(ConfigError::at(
                format!("expected 'server {{', found '{}'", line),
                no,
            ));
        }
        index += 1;
    }

    Ok(AppConfig { servers })
}

fn parse_server_block(lines: &[Line], index: &mut usize) -> Result<ServerConfig, ConfigError> {
    let mut server = ServerConfig::default();

    while *index < lines.len() {
        let (no, line) = lines[*index];

        if is_block_end(line) {
            return Ok(server);
        }

        if line.starts_with("listen") {
            let port: u16 = extract_value(line)
                .parse()
                .map_err(|_| ConfigError::at(format!("invalid listen port: '{}'", line), no))?;
            if port == 0 {
                return Err(ConfigError::at("listen port must be non-zero".into(), no));
            }
            server.port = port;
        } else if line.starts_with("host") {
            server.host = extract_value(line);
        } else if line.starts_with("server_name") {
            server.server_name = extract_value(line);
        } else if line.starts_with("client_max_body_size") {
            let value = extract_value(line);
            server.client_max_body_size = parse_body_size(&value).ok_or_else(|| {
                ConfigError::at(format!("invalid client_max_body_size: '{}'", value), no)
            })?;
        } else if line.starts_with("error_page") {
            let value = extract_value(line);
            let mut parts = value.split_whitespace();
            let status = parts
                .next()
                .and_then(|s| s.parse::<u16>().ok())
                .ok_or_else(|| ConfigError::at(format!("invalid error_page: '{}'", value), no))?;
            let path = parts
                .next()
                .ok_or_else(|| ConfigError::at(format!("error_page missing path: '{}'", value), no))?;
            server.error_pages.insert(status, path.to_string());
        } else if is_block_start(line, "location") {
            let path = location_path(line)
                .ok_or_else(|| ConfigError::at(format!("location missing path: '{}'", line), no))?;
            *index += 1;
            server.locations.push(parse_location_block(lines, index, path)?);
        } else {
            return Err(ConfigError::at(format!("unknown directive: '{}'", line), no));
        }

        *index += 1;
    }

    Err(ConfigError::new("unterminated server block".into()))
}

fn parse_location_block(
    lines: &[Line],
    index: &mut usize,
    path: String,
) -> Result<LocationConfig, ConfigError> {
    let mut location = LocationConfig {
        path,
        index: String::new(),
        methods: vec!["GET".to_string()],
        ..LocationConfig::default()
    };

    while *index < lines.len() {
        let (no, line) = lines[*index];

        if is_block_end(line) {
            return Ok(location);
        }

        if line.starts_with("root") {
            location.root = extract_value(line);
        } else if line.starts_with("index") {
            location.index = extract_value(line);
        } else if line.starts_with("methods") {
            location.methods = extract_value(line)
                .split_whitespace()
                .map(|m| m.to_uppercase())
                .collect();
        } else if line.starts_with("upload_path") {
            location.upload_path = extract_value(line);
        } else if line.starts_with("autoindex") {
            let value = extract_value(line).to_lowercase();
            location.autoindex = matches!(value.as_str(), "on" | "true" | "yes");
        } else if line.starts_with("cgi_extension") {
            location.cgi_extension = extract_value(line);
            location.cgi_enabled = true;
        } else if line.starts_with("cgi_path") {
            location.cgi_path = extract_value(line);
        } else if line.starts_with("return") {
            location.redirect = parse_redirect(&extract_value(line));
        } else {
            return Err(ConfigError::at(format!("unknown directive: '{}'", line), no));
        }

        *index += 1;
    }

    Err(ConfigError::new("unterminated location block".into()))
}

/// Everything after the directive name, trimmed, without a trailing `;`.
fn extract_value(line: &str) -> String {
    let value = match line.find(char::is_whitespace) {
        Some(pos) => &line[pos..],
        None => return String::new(),
    };
    value.trim().trim_end_matches(';').trim().to_string()
}

fn location_path(line: &str) -> Option<String> {
    let start = line.find(char::is_whitespace)?;
    let end = line.rfind('{')?;
    let path = line[start..end].trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

fn is_block_start(line: &str, block: &str) -> bool {
    line.starts_with(block) && line.ends_with('{')
}

fn is_block_end(line: &str) -> bool {
    line == "}"
}
