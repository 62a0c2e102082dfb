//! Bounded-concurrency HTTP workload runner.

use crate::report::{RequestOutcome, WorkloadReport};
use dobrika_common::{HarnessError, HarnessResult};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues JSON POSTs with at most `concurrency` in flight.
///
/// Every call becomes a [`RequestOutcome`]; transport failures and timeouts
/// are failed outcomes, never errors. There are no retries.
#[derive(Clone)]
pub struct WorkloadRunner {
    client: Client<HttpConnector, Full<Bytes>>,
    request_timeout: Duration,
}

impl std::fmt::Debug for WorkloadRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadRunner")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for WorkloadRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkloadRunner {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(request_timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            request_timeout,
        }
    }

    /// POST each payload to `url` and return the outcomes in completion order.
    ///
    /// A `concurrency` of 0 is treated as 1. Fails only if `url` is invalid
    /// or a payload cannot be encoded, before any request is sent.
    pub async fn execute<T: Serialize>(
        &self,
        url: &str,
        payloads: &[T],
        concurrency: usize,
    ) -> HarnessResult<Vec<RequestOutcome>> {
        let uri: Uri = url
            .parse()
            .map_err(|e| HarnessError::configuration(format!("Invalid URL {}: {}", url, e)))?;

        let bodies = payloads
            .iter()
            .map(|p| serde_json::to_vec(p).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| HarnessError::configuration(format!("Failed to encode payload: {}", e)))?;

        let concurrency = concurrency.max(1);
        debug!(url, requests = bodies.len(), concurrency, "Starting workload batch");

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        for body in bodies {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let uri = uri.clone();
            let request_timeout = self.request_timeout;
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return RequestOutcome::failed(Duration::ZERO);
                };
                post_one(&client, uri, body, request_timeout).await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "Request task failed");
                    outcomes.push(RequestOutcome::failed(Duration::ZERO));
                }
            }
        }

        Ok(outcomes)
    }

    /// [`execute`](Self::execute) and reduce the batch to a report.
    pub async fn run<T: Serialize>(
        &self,
        url: &str,
        payloads: &[T],
        concurrency: usize,
    ) -> HarnessResult<WorkloadReport> {
        let started = Instant::now();
        let outcomes = self.execute(url, payloads, concurrency).await?;
        let report = WorkloadReport::from_outcomes(&outcomes, started.elapsed());
        info!(
            url,
            total = report.total,
            failures = report.failures,
            p50_ms = report.p50_ms,
            p95_ms = report.p95_ms,
            "Workload batch finished"
        );
        Ok(report)
    }
}

async fn post_one(
    client: &Client<HttpConnector, Full<Bytes>>,
    uri: Uri,
    body: Bytes,
    request_timeout: Duration,
) -> RequestOutcome {
    let started = Instant::now();

    let request = match Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(body))
    {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Failed to build request");
            return RequestOutcome::failed(started.elapsed());
        }
    };

    // The body is drained inside the deadline so the connection can be reused.
    let exchange = async {
        let response = client.request(request).await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        response
            .into_body()
            .collect()
            .await
            .map_err(|e| e.to_string())?;
        Ok::<u16, String>(status)
    };

    match timeout(request_timeout, exchange).await {
        Ok(Ok(status)) => RequestOutcome::completed(status, started.elapsed()),
        Ok(Err(e)) => {
            debug!(error = %e, "Request failed");
            RequestOutcome::failed(started.elapsed())
        }
        Err(_) => {
            debug!(timeout = ?request_timeout, "Request timed out");
            RequestOutcome::failed(started.elapsed())
        }
    }
}
