use core::fmt;
use std::{
    error::Error,
    fmt::{Debug, Display, Formatter},
};

use crate::config::ConfigError;

/// Boxed error that prints without a `Debug` dump when it bubbles out of `main`.
pub struct ServerError(pub Box<dyn Error>);

impl Debug for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\r\x1b[K{}", self)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[31mERROR\x1b[0m: {}", self.0)
    }
}

impl Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(e: std::net::AddrParseError) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<serde_yaml::Error> for ServerError {
    fn from(e: serde_yaml::Error) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<String> for ServerError {
    fn from(s: String) -> Self {
        ServerError(Box::new(ConfigError::new(s)))
    }
}

impl From<&str> for ServerError {
    fn from(s: &str) -> Self {
        ServerError(Box::new(ConfigError::new(s.to_string())))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
