//! Child environment assembly.
//!
//! Layers, lowest precedence first: service defaults, the harness's own
//! environment, caller overrides, then the address/port/storage chosen for
//! this launch. The result is built once and handed to the spawned command
//! by value; the harness's process environment is never modified.

use std::collections::BTreeMap;
use std::path::Path;

pub const ENV_ADDR: &str = "DOBRIKA_ADDR";
pub const ENV_PORT: &str = "DOBRIKA_PORT";
pub const ENV_DB_PATH: &str = "DOBRIKA_DB_PATH";
pub const ENV_COLD_MIN: &str = "DOBRIKA_COLD_MIN";
pub const ENV_HOT_MIN: &str = "DOBRIKA_HOT_MIN";
pub const ENV_SEARCH_OFFSET: &str = "DOBRIKA_SEARCH_OFFSET";
pub const ENV_SEARCH_LIMIT: &str = "DOBRIKA_SEARCH_LIMIT";
pub const ENV_GEO_INDEX: &str = "DOBRIKA_GEO_INDEX";
pub const ENV_LOG_REQUESTS: &str = "DOBRIKA_LOG_REQUESTS";

pub const DEFAULT_ADDR: &str = "127.0.0.1";

/// Service tuning defaults applied when nothing else sets them.
pub const SERVICE_DEFAULTS: &[(&str, &str)] = &[
    (ENV_ADDR, DEFAULT_ADDR),
    (ENV_COLD_MIN, "30"),
    (ENV_HOT_MIN, "15"),
    (ENV_SEARCH_OFFSET, "0"),
    (ENV_SEARCH_LIMIT, "20"),
    (ENV_GEO_INDEX, "9"),
    (ENV_LOG_REQUESTS, "0"),
];

/// Immutable environment for one server launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnvironment {
    vars: BTreeMap<String, String>,
}

impl LaunchEnvironment {
    /// Layer defaults, `inherited`, `overrides` and the launch's own
    /// address, port and storage path.
    pub fn assemble<I, K, V>(
        inherited: I,
        overrides: &BTreeMap<String, String>,
        addr: &str,
        port: u16,
        storage_dir: &Path,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: BTreeMap<String, String> = SERVICE_DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        vars.extend(inherited.into_iter().map(|(k, v)| (k.into(), v.into())));
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        vars.insert(ENV_ADDR.to_string(), addr.to_string());
        vars.insert(ENV_PORT.to_string(), port.to_string());
        vars.insert(
            ENV_DB_PATH.to_string(),
            storage_dir.to_string_lossy().into_owned(),
        );

        Self { vars }
    }

    /// Same as [`assemble`](Self::assemble) with the harness's current
    /// environment as the inherited layer. Non-UTF-8 entries are skipped.
    pub fn from_current(
        overrides: &BTreeMap<String, String>,
        addr: &str,
        port: u16,
        storage_dir: &Path,
    ) -> Self {
        Self::assemble(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }), overrides, addr, port, storage_dir)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}
