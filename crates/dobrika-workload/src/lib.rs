//! Workload generation for the Dobrika harness.
//!
//! A [`WorkloadRunner`] fires JSON POSTs at the service with bounded
//! concurrency and records one [`RequestOutcome`] per call; a
//! [`WorkloadReport`] reduces a batch to counts and latency percentiles.

pub mod payloads;
pub mod report;
pub mod runner;
pub mod stats;

pub use payloads::{extract_queries, load_tasks, random_geo_hint, search_payloads, SearchRequest, SearchResponse, TaskDocument};
pub use report::{RequestOutcome, WorkloadReport};
pub use runner::{WorkloadRunner, DEFAULT_REQUEST_TIMEOUT};
pub use stats::{average_ms, percentile_ms};
