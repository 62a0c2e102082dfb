//! Readiness gate.
//!
//! The service exposes no push notification for readiness, so the gate polls
//! `{base_url}/healthz` at a fixed interval until it answers 200 or the
//! deadline passes. The interval bounds both how quickly readiness is noticed
//! and how hard a still-starting process gets hit.

use crate::http::HttpHealthProbe;
use crate::{HealthCheckData, HealthCheckResult};
use async_trait::async_trait;
use dobrika_common::types::join_url;
use dobrika_common::{HarnessError, HarnessResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A single readiness probe. Implemented over HTTP for real runs; tests
/// substitute scripted probes.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> HealthCheckResult<HealthCheckData>;
}

/// Health gate configuration
#[derive(Debug, Clone)]
pub struct HealthGateConfig {
    /// Path of the readiness endpoint.
    pub path: String,
    /// Sleep between failed probes.
    pub poll_interval: Duration,
    /// Upper bound on a single probe; always much shorter than the deadline.
    pub probe_timeout: Duration,
}

impl Default for HealthGateConfig {
    fn default() -> Self {
        Self {
            path: "/healthz".to_string(),
            poll_interval: Duration::from_millis(250),
            probe_timeout: Duration::from_millis(1500),
        }
    }
}

/// What the gate saw before the service became ready.
#[derive(Debug, Clone)]
pub struct ReadyReport {
    pub url: String,
    pub attempts: u32,
    pub waited: Duration,
    pub last_check: HealthCheckData,
}

/// Blocks callers until the service answers its readiness endpoint.
#[derive(Clone)]
pub struct HealthGate {
    config: HealthGateConfig,
    probe: Arc<dyn HealthProbe>,
}

impl std::fmt::Debug for HealthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthGate")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new(HealthGateConfig::default())
    }
}

impl HealthGate {
    /// Gate backed by the HTTP probe.
    pub fn new(config: HealthGateConfig) -> Self {
        Self::with_probe(config, Arc::new(HttpHealthProbe::default()))
    }

    pub fn with_probe(config: HealthGateConfig, probe: Arc<dyn HealthProbe>) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &HealthGateConfig {
        &self.config
    }

    /// Poll until the readiness endpoint reports healthy or `timeout` elapses.
    ///
    /// On expiry returns [`HarnessError::HealthTimeout`] carrying the last
    /// observed error or status. Neither a probe nor a sleep is allowed to run
    /// past the deadline.
    pub async fn wait_healthy(&self, base_url: &str, timeout: Duration) -> HarnessResult<ReadyReport> {
        let url = join_url(base_url, &self.config.path);
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = 0u32;
        let mut last_error: Option<String> = None;

        debug!(url = %url, ?timeout, "Waiting for service to become healthy");

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let probe_timeout = self.config.probe_timeout.min(deadline - now);
            attempts += 1;

            match tokio::time::timeout(probe_timeout, self.probe.probe(&url, probe_timeout)).await {
                Ok(Ok(data)) if data.is_healthy => {
                    let waited = started.elapsed();
                    info!(url = %url, attempts, ?waited, "Service is healthy");
                    return Ok(ReadyReport {
                        url,
                        attempts,
                        waited,
                        last_check: data,
                    });
                }
                Ok(Ok(data)) => {
                    last_error = Some(
                        data.error_message
                            .unwrap_or_else(|| "unhealthy".to_string()),
                    );
                }
                Ok(Err(e)) => last_error = Some(e.to_string()),
                Err(_) => last_error = Some(format!("Probe timed out after {:?}", probe_timeout)),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }

        let waited = started.elapsed();
        warn!(url = %url, attempts, ?waited, last_error = ?last_error, "Service not healthy within timeout");
        Err(HarnessError::health_timeout(url, waited, last_error))
    }
}
