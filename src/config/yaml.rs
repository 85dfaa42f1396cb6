//! YAML configuration dialect.

use std::collections::HashMap;

use serde::Deserialize;

use super::{AppConfig, LocationConfig, ServerConfig, parse_redirect};
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct RawConfig {
    servers: Vec<RawServer>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    listen: Option<u16>,
    host: Option<String>,
    server_name: Option<String>,
    client_max_body_size: Option<usize>,
    error_pages: Option<HashMap<u16, String>>,
    locations: Option<Vec<RawLocation>>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    path: String,
    root: Option<String>,
    index: Option<String>,
    methods: Option<Vec<String>>,
    upload_path: Option<String>,
    autoindex: Option<bool>,
    cgi_extension: Option<String>,
    cgi_path: Option<String>,
    redirect: Option<String>,
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let raw: RawConfig = serde_yaml::from_str(content)?;

    let servers = raw.servers.into_iter().map(into_server).collect();
    Ok(AppConfig { servers })
}

fn into_server(raw: RawServer) -> ServerConfig {
    let mut server = ServerConfig::default();

    if let Some(port) = raw.listen {
        server.port = port;
    }
    if let Some(host) = raw.host {
        server.host = host;
    }
    if let Some(name) = raw.server_name {
        server.server_name = name;
    }
    if let Some(size) = raw.client_max_body_size {
        server.client_max_body_size = size;
    }
    if let Some(pages) = raw.error_pages {
        server.error_pages.extend(pages);
    }

    server.locations = raw
        .locations
        .unwrap_or_default()
        .into_iter()
        .map(into_location)
        .collect();

    server
}

fn into_location(raw: RawLocation) -> LocationConfig {
    let cgi_extension = raw.cgi_extension.unwrap_or_default();

    LocationConfig {
        path: raw.path,
        root: raw.root.unwrap_or_else(|| super::DEFAULT_ROOT.to_string()),
        index: raw.index.unwrap_or_default(),
        methods: raw.methods.unwrap_or_else(|| vec!["GET".to_string()]),
        upload_path: raw.upload_path.unwrap_or_default(),
        autoindex: raw.autoindex.unwrap_or(false),
        cgi_enabled: !cgi_extension.is_empty(),
        cgi_extension,
        cgi_path: raw.cgi_path.unwrap_or_default(),
        redirect: raw.redirect.as_deref().and_then(parse_redirect),
    }
}
