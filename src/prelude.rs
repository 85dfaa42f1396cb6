pub use crate::config::{AppConfig, LocationConfig, ServerConfig};
pub use crate::error::Result;
pub use crate::http::*;

pub use mio::{
    Events, Interest, Poll, Token,
    net::{TcpListener, TcpStream},
};
pub use std::collections::HashMap;
pub use std::fs::{self, File};
pub use std::io::{ErrorKind, Read, Write};
pub use std::net::SocketAddr;
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
pub use std::time::{Duration, Instant};
pub use weblog::{debug, error, info, trace, warn};

pub use crate::reactor::{Reactor, Readiness};
pub use crate::router::RouteOutcome;

pub const READ_BUF_SIZE: usize = 4096;
pub const LISTEN_BACKLOG: u32 = 128;

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);
pub const CGI_TIMEOUT: Duration = Duration::from_secs(5);
pub const CGI_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const CGI_READ_CHUNK: usize = 8192;

// 2xx / 3xx
pub const HTTP_OK: u16 = 200;
pub const HTTP_CREATED: u16 = 201;
pub const HTTP_FOUND: u16 = 302;

// 4xx client errors
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;
pub const HTTP_METHOD_NOT_ALLOWED: u16 = 405;
pub const HTTP_PAYLOAD_TOO_LARGE: u16 = 413;

// 5xx server errors
pub const HTTP_INTERNAL_SERVER_ERROR: u16 = 500;
pub const HTTP_NOT_IMPLEMENTED: u16 = 501;

pub use crate::config::DEFAULT_MAX_BODY_SIZE;
