//! Core domain types shared across the harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host and port a Dobrika service listens on.
///
/// # Example
/// ```
/// use dobrika_common::ServiceAddress;
///
/// let addr = ServiceAddress::new("127.0.0.1", 8088);
/// assert_eq!(addr.base_url(), "http://127.0.0.1:8088");
/// assert_eq!(addr.url("/healthz"), "http://127.0.0.1:8088/healthz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
}

impl ServiceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Joins `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url(), path)
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Joins a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
