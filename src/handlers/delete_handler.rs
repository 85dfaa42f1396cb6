use std::fs;
use std::path::Path;

use weblog::{info, warn};

use crate::config::{LocationConfig, ServerConfig};
use crate::handlers::get_handler::{is_traversal, resolve_path, sanitize_path};
use crate::http::response::{HttpResponse, error_response};
use crate::prelude::{HTTP_FORBIDDEN, HTTP_INTERNAL_SERVER_ERROR, HTTP_NOT_FOUND, HTTP_OK};
use crate::utils::url_decode;

pub fn handle_delete(
    uri: &str,
    location: &LocationConfig,
    server: &ServerConfig,
) -> HttpResponse {
    let raw = resolve_path(uri, location);
    if is_traversal(uri) || is_traversal(&raw) {
        warn!("DELETE traversal attempt: {}", uri);
        return error_response(HTTP_FORBIDDEN, Some(server));
    }

    // Percent-escapes are only honored on the DELETE path, and the
    // decoded result gets its own traversal check.
    let filepath = url_decode(&sanitize_path(&raw));
    if is_traversal(&filepath) {
        warn!("DELETE traversal attempt (encoded): {}", uri);
        return error_response(HTTP_FORBIDDEN, Some(server));
    }

    let path = Path::new(&filepath);
    let Ok(metadata) = fs::metadata(path) else {
        return error_response(HTTP_NOT_FOUND, Some(server));
    };

    if metadata.is_dir() {
        return error_response(HTTP_FORBIDDEN, Some(server));
    }

    match fs::remove_file(path) {
        Ok(()) => {
            info!("deleted {}", filepath);
            let mut response = HttpResponse::new(HTTP_OK);
            response.set_body(
                "<!DOCTYPE html>\n<html><head><title>File Deleted</title></head><body>\n\
                 <h1>File Deleted Successfully</h1>\n<p>The file has been deleted.</p>\n\
                 <a href=\"/\">Back to home</a>\n</body></html>\n"
                    .into(),
            );
            response
        }
        Err(_) => error_response(HTTP_INTERNAL_SERVER_ERROR, Some(server)),
    }
}
