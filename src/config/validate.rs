use std::collections::HashSet;

use super::{AppConfig, ConfigError, LocationConfig, ServerConfig};

/// Post-parse sanity pass shared by both dialects.
///
/// A file that yields zero servers still boots: a default server with a
/// single `/` location is injected, matching the original fallback
/// behavior.
pub fn validate(mut config: AppConfig) -> Result<AppConfig, ConfigError> {
    if config.servers.is_empty() {
        weblog::warn!("no server configuration found, using defaults");
        let mut server = ServerConfig::default();
        server.locations.push(LocationConfig::default());
        config.servers.push(server);
    }

    let mut bound: HashSet<(String, u16)> = HashSet::new();

    for server in &mut config.servers {
        let key = (server.host.clone(), server.port);
        if !bound.insert(key) {
            return Err(ConfigError::new(format!(
                "duplicate listener {}:{}",
                server.host, server.port
            )));
        }

        if server.locations.is_empty() {
            server.locations.push(LocationConfig::default());
        }

        for location in &mut server.locations {
            if !location.path.starts_with('/') {
                return Err(ConfigError::new(format!(
                    "location path must begin with '/': '{}'",
                    location.path
                )));
            }

            if location.cgi_enabled {
                if location.cgi_extension.is_empty() || location.cgi_path.is_empty() {
                    return Err(ConfigError::new(format!(
                        "location '{}': cgi requires both cgi_extension and cgi_path",
                        location.path
                    )));
                }
                if !location.cgi_extension.starts_with('.') {
                    location.cgi_extension.insert(0, '.');
                }
            }
        }
    }

    Ok(config)
}
