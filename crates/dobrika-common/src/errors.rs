//! Error types for the harness.
//!
//! Every fatal setup condition is a variant here. Per-request failures during
//! workload execution are *not* errors: they are recorded as failed outcomes
//! and only show up in aggregate statistics. Teardown problems are swallowed
//! by the supervisor and never reach this type either.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Fatal harness errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A required launch parameter is missing or malformed.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// The server binary does not exist.
    #[error("Server binary not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The OS refused to spawn the server binary.
    #[error("Failed to spawn {}: {reason}", .path.display())]
    SpawnFailed { path: PathBuf, reason: String },

    /// A spawned service never answered 200 on its health endpoint.
    #[error("Server not healthy at {url} within {waited:?}{}", last_error_suffix(.last_error))]
    HealthTimeout {
        url: String,
        waited: Duration,
        last_error: Option<String>,
    },

    /// An externally managed service did not answer the preliminary probe.
    #[error("Service is not responding at {url}{}", last_error_suffix(.last_error))]
    ServiceUnavailable {
        url: String,
        last_error: Option<String>,
    },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(": {}", e),
        None => String::new(),
    }
}

impl HarnessError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn spawn_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn health_timeout(
        url: impl Into<String>,
        waited: Duration,
        last_error: Option<String>,
    ) -> Self {
        Self::HealthTimeout {
            url: url.into(),
            waited,
            last_error,
        }
    }

    pub fn service_unavailable(url: impl Into<String>, last_error: Option<String>) -> Self {
        Self::ServiceUnavailable {
            url: url.into(),
            last_error,
        }
    }

    /// Process exit code the harness reports for this error.
    ///
    /// * `2` - binary not found
    /// * `3` - startup health gate timed out
    /// * `4` - external service not answering the preliminary probe
    /// * `1` - anything else
    pub fn exit_code(&self) -> u8 {
        match self {
            HarnessError::NotFound { .. } => 2,
            HarnessError::HealthTimeout { .. } => 3,
            HarnessError::ServiceUnavailable { .. } => 4,
            HarnessError::Configuration { .. }
            | HarnessError::SpawnFailed { .. }
            | HarnessError::Io(_) => 1,
        }
    }
}
