//! Request bodies for the service's `/index` and `/search` endpoints.

use dobrika_common::{HarnessError, HarnessResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

const MIN_QUERY_LEN: usize = 3;
const MAX_QUERIES: usize = 100;
const FALLBACK_QUERIES: &[&str] = &["demo", "task", "search", "index", "geo", "default"];

/// Body of `POST /index`.
///
/// Fields the harness does not know about are kept and sent back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub task_id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub task_desc: String,
    #[serde(default)]
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_tags: Option<Vec<String>>,
    /// `"lat,lon"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_data: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_data: Option<String>,
}

/// Body of a `/search` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    #[serde(default)]
    pub task_id: Vec<String>,
}

/// Read a JSON array of tasks from `path`, keeping at most `limit`.
pub fn load_tasks(path: &Path, limit: usize) -> HarnessResult<Vec<TaskDocument>> {
    let content = std::fs::read_to_string(path)?;
    let mut tasks: Vec<TaskDocument> = serde_json::from_str(&content).map_err(|e| {
        HarnessError::configuration(format!("Invalid tasks file {}: {}", path.display(), e))
    })?;
    tasks.truncate(limit);
    debug!(path = %path.display(), count = tasks.len(), "Loaded tasks");
    Ok(tasks)
}

/// Search terms taken from task names and descriptions.
///
/// Words of at least three characters (commas count as separators),
/// de-duplicated in first-seen order and capped at 100. Falls back to a
/// fixed list when the tasks contain no usable words.
pub fn extract_queries(tasks: &[TaskDocument]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries: Vec<String> = tasks
        .iter()
        .flat_map(|t| {
            format!("{} {}", t.task_name, t.task_desc)
                .replace(',', " ")
                .split_whitespace()
                .filter(|w| w.chars().count() >= MIN_QUERY_LEN)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|w| seen.insert(w.clone()))
        .collect();

    if queries.is_empty() {
        queries = FALLBACK_QUERIES.iter().map(|s| s.to_string()).collect();
    }
    queries.truncate(MAX_QUERIES);
    queries
}

/// A random `"lat,lon"` with lat in [-60, 60] and lon in [-160, 160].
pub fn random_geo_hint<R: Rng>(rng: &mut R) -> String {
    let lat: f64 = rng.gen_range(-60.0..=60.0);
    let lon: f64 = rng.gen_range(-160.0..=160.0);
    format!("{:.4},{:.4}", lat, lon)
}

/// `count` default-type searches, each with a random term and geo hint.
pub fn search_payloads<R: Rng>(
    queries: &[String],
    count: usize,
    rng: &mut R,
) -> Vec<SearchRequest> {
    (0..count)
        .map(|_| SearchRequest {
            query_type: "default".to_string(),
            user_query: queries.choose(rng).cloned(),
            user_tags: None,
            geo_data: Some(random_geo_hint(rng)),
        })
        .collect()
}
