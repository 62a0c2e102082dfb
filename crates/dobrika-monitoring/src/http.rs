// HTTP health probe implementation

use crate::gate::HealthProbe;
use crate::{HealthCheckData, HealthCheckError, HealthCheckResult};
use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// HTTP probe configuration
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    pub expected_status: Vec<u16>,
    /// Substring the body must contain, e.g. the service's `ok`.
    pub expected_body: Option<String>,
    pub user_agent: String,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            expected_status: vec![200],
            expected_body: None,
            user_agent: "dobrika-harness/0.1".to_string(),
        }
    }
}

impl HttpProbeConfig {
    pub fn with_expected_body(mut self, marker: impl Into<String>) -> Self {
        self.expected_body = Some(marker.into());
        self
    }

    pub fn with_expected_status(mut self, status_codes: Vec<u16>) -> Self {
        self.expected_status = status_codes;
        self
    }
}

/// Probes a readiness endpoint with a plain HTTP/1 GET.
///
/// The underlying client is pooled and reused across probes.
#[derive(Clone)]
pub struct HttpHealthProbe {
    config: HttpProbeConfig,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl std::fmt::Debug for HttpHealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHealthProbe")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new(HttpProbeConfig::default())
    }
}

impl HttpHealthProbe {
    pub fn new(config: HttpProbeConfig) -> Self {
        Self {
            config,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Perform one GET against `url`, bounded by `check_timeout`.
    ///
    /// Transport failures and timeouts yield an unhealthy result rather than
    /// an error; only a malformed URL is an error.
    pub async fn check(&self, url: &str, check_timeout: Duration) -> HealthCheckResult<HealthCheckData> {
        let start_time = Instant::now();

        let uri: Uri = url.parse().map_err(|e| HealthCheckError::InvalidRequest {
            url: url.to_string(),
            reason: format!("Invalid URI: {}", e),
        })?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("User-Agent", &self.config.user_agent)
            .body(Empty::<Bytes>::new())
            .map_err(|e| HealthCheckError::InvalidRequest {
                url: url.to_string(),
                reason: format!("Failed to build request: {}", e),
            })?;

        let response = match timeout(check_timeout, self.client.request(request)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                debug!(url, error = %e, "Health probe connection failed");
                return Ok(HealthCheckData::unhealthy(
                    None,
                    Some(elapsed_ms(start_time)),
                    format!("Connection failed: {}", e),
                ));
            }
            Err(_) => {
                debug!(url, "Health probe timed out");
                return Ok(HealthCheckData::unhealthy(
                    None,
                    Some(check_timeout.as_millis() as u64),
                    format!("Timed out after {:?}", check_timeout),
                ));
            }
        };

        let status = response.status().as_u16();

        if !self.config.expected_status.contains(&status) {
            return Ok(HealthCheckData::unhealthy(
                Some(status),
                Some(elapsed_ms(start_time)),
                format!("HTTP {}", status),
            ));
        }

        if let Some(expected) = &self.config.expected_body {
            let remaining = check_timeout.saturating_sub(start_time.elapsed());
            let body = match timeout(remaining, response.into_body().collect()).await {
                Ok(Ok(collected)) => collected.to_bytes(),
                Ok(Err(e)) => {
                    return Err(HealthCheckError::InvalidResponse {
                        url: url.to_string(),
                        reason: format!("Failed to read body: {}", e),
                    })
                }
                Err(_) => {
                    return Ok(HealthCheckData::unhealthy(
                        Some(status),
                        Some(elapsed_ms(start_time)),
                        "Timed out reading body",
                    ))
                }
            };

            let body = String::from_utf8_lossy(&body);
            if !body.contains(expected.as_str()) {
                debug!(url, expected = %expected, body = %body, "Health probe body mismatch");
                return Ok(HealthCheckData::unhealthy(
                    Some(status),
                    Some(elapsed_ms(start_time)),
                    format!("Body does not contain '{}'", expected),
                ));
            }
        }

        let elapsed = elapsed_ms(start_time);
        debug!(url, status, elapsed_ms = elapsed, "Health probe passed");
        Ok(HealthCheckData::healthy(status, elapsed))
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> HealthCheckResult<HealthCheckData> {
        self.check(url, timeout).await
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
