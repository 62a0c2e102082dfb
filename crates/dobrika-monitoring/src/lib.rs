//! # Dobrika Monitoring
//!
//! Health checking for the service under test:
//! - a single HTTP probe of the readiness endpoint ([`http`])
//! - the polling gate that blocks until the service is ready ([`gate`])

pub mod gate;
pub mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Health check error types.
#[derive(Error, Debug)]
pub enum HealthCheckError {
    #[error("Health check invalid request: {url} - {reason}")]
    InvalidRequest { url: String, reason: String },

    #[error("Health check invalid response: {url} - {reason}")]
    InvalidResponse { url: String, reason: String },
}

/// Result type for health check operations.
pub type HealthCheckResult<T> = Result<T, HealthCheckError>;

/// Outcome of a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckData {
    pub is_healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub response_time_ms: Option<u64>,
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    pub error_message: Option<String>,
}

impl HealthCheckData {
    pub fn healthy(status: u16, response_time_ms: u64) -> Self {
        Self {
            is_healthy: true,
            checked_at: Utc::now(),
            response_time_ms: Some(response_time_ms),
            status: Some(status),
            error_message: None,
        }
    }

    pub fn unhealthy(
        status: Option<u16>,
        response_time_ms: Option<u64>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            is_healthy: false,
            checked_at: Utc::now(),
            response_time_ms,
            status,
            error_message: Some(error_message.into()),
        }
    }
}

// Re-export main types
pub use gate::{HealthGate, HealthGateConfig, HealthProbe, ReadyReport};
pub use http::{HttpHealthProbe, HttpProbeConfig};
