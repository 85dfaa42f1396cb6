use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

use weblog::{debug, warn};

use crate::config::{LocationConfig, ServerConfig};
use crate::http::response::{HttpResponse, content_type_for, error_response};
use crate::prelude::{HTTP_FORBIDDEN, HTTP_INTERNAL_SERVER_ERROR, HTTP_NOT_FOUND, HTTP_OK};

/// Maps a request URI onto the location's root: the leading `/` and the
/// location prefix are stripped from the URI, the remainder joined under
/// `root` with a single separator.
pub fn resolve_path(uri: &str, location: &LocationConfig) -> String {
    let mut relative = uri.strip_prefix('/').unwrap_or(uri);

    if location.path != "/" {
        let prefix = location.path.strip_prefix('/').unwrap_or(&location.path);
        if let Some(rest) = relative.strip_prefix(prefix) {
            relative = rest.strip_prefix('/').unwrap_or(rest);
        }
    }

    let mut path = location.root.clone();
    if !path.ends_with('/') && !relative.is_empty() {
        path.push('/');
    }
    path.push_str(relative);
    path
}

/// String-level traversal test, applied to both the raw URI and the
/// resolved path before any filesystem call.
pub fn is_traversal(path: &str) -> bool {
    path.contains("../") || path.contains("/..")
}

/// Collapses `//` runs left over from joining.
pub fn sanitize_path(path: &str) -> String {
    let mut clean = path.to_string();
    while clean.contains("//") {
        clean = clean.replace("//", "/");
    }
    clean
}

pub fn handle_get(
    uri: &str,
    location: &LocationConfig,
    server: &ServerConfig,
) -> HttpResponse {
    let raw = resolve_path(uri, location);
    if is_traversal(uri) || is_traversal(&raw) {
        warn!("path traversal attempt: {}", uri);
        return error_response(HTTP_FORBIDDEN, Some(server));
    }

    let filepath = sanitize_path(&raw);
    let path = Path::new(&filepath);

    let Ok(metadata) = fs::metadata(path) else {
        debug!("not found: {}", filepath);
        return error_response(HTTP_NOT_FOUND, Some(server));
    };

    if metadata.is_dir() {
        if !location.index.is_empty() {
            let index_path = path.join(&location.index);
            if index_path.is_file() {
                return serve_static(&index_path, server);
            }
        }

        if location.autoindex {
            return generate_autoindex(path, uri);
        }

        debug!("directory listing disabled: {}", filepath);
        return error_response(HTTP_FORBIDDEN, Some(server));
    }

    serve_static(path, server)
}

pub fn serve_static(path: &Path, server: &ServerConfig) -> HttpResponse {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::NotFound => HTTP_NOT_FOUND,
                ErrorKind::PermissionDenied => HTTP_FORBIDDEN,
                _ => HTTP_INTERNAL_SERVER_ERROR,
            };
            return error_response(status, Some(server));
        }
    };

    let mut content = Vec::new();
    if file.read_to_end(&mut content).is_err() {
        return error_response(HTTP_INTERNAL_SERVER_ERROR, Some(server));
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let mut response = HttpResponse::new(HTTP_OK);
    response.set_content_type(content_type_for(name));
    response.set_body(content);
    response
}

/// HTML directory listing: entries sorted, `.` hidden, `..` first, links
/// relative to the request URI, directories marked with a trailing `/`.
pub fn generate_autoindex(dir: &Path, uri: &str) -> HttpResponse {
    let mut entries: Vec<(String, bool)> = Vec::new();

    if let Ok(dir_entries) = dir.read_dir() {
        for entry in dir_entries.flatten() {
            if let Ok(name) = entry.file_name().into_string() {
                let is_dir = entry.path().is_dir();
                entries.push((name, is_dir));
            }
        }
    }
    entries.sort();

    let base = uri.trim_end_matches('/');
    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><meta charset='UTF-8'>\
         <title>Index of {uri}</title></head><body>\n<h1>Index of {uri}</h1>\n<ul>\n",
        uri = uri
    );
    html.push_str(&format!("<li><a href=\"{}/..\">..</a></li>\n", base));

    for (name, is_dir) in entries {
        let marker = if is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{base}/{name}\">{name}{marker}</a></li>\n",
            base = base,
            name = name,
            marker = marker
        ));
    }

    html.push_str("</ul>\n<hr><p><em>Webserv/1.0</em></p>\n</body></html>\n");

    let mut response = HttpResponse::new(HTTP_OK);
    response.set_body(html.into_bytes());
    response
}
