//! Supervisor configuration.
//!
//! Usually built from defaults; can also be loaded from YAML:
//!
//! ```yaml
//! startup_timeout: 20s
//! grace_period: 10s
//! poll_interval: 250ms
//! probe_timeout: 1500ms
//! log_tail_lines: 200
//! mirror_output: true
//! server_log_file: target/tmp/dobrika-server.log
//! environment:
//!   DOBRIKA_SEARCH_LIMIT: "50"
//! ```

use anyhow::{Context, Result};
use dobrika_log_collection::{LogCollectorConfig, DEFAULT_TAIL_CAPACITY};
use dobrika_monitoring::HealthGateConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// How the supervisor launches, gates and stops the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Deadline for the health gate after spawn.
    #[serde(default = "default_startup_timeout", with = "duration_serde")]
    pub startup_timeout: Duration,

    /// How long a graceful stop may take before the group is killed.
    #[serde(default = "default_grace_period", with = "duration_serde")]
    pub grace_period: Duration,

    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Lines of stdout/stderr retained for failure diagnostics.
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,

    /// Mirror server output to the harness's stdout/stderr.
    #[serde(default = "default_true")]
    pub mirror_output: bool,

    /// Also append server output to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_log_file: Option<PathBuf>,

    /// Extra variables for the server, overriding inherited values and defaults.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            startup_timeout: default_startup_timeout(),
            grace_period: default_grace_period(),
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
            log_tail_lines: default_log_tail_lines(),
            mirror_output: true,
            server_log_file: None,
            environment: BTreeMap::new(),
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: SupervisorConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn health_gate_config(&self) -> HealthGateConfig {
        HealthGateConfig {
            poll_interval: self.poll_interval,
            probe_timeout: self.probe_timeout,
            ..Default::default()
        }
    }

    pub fn log_collector_config(&self) -> LogCollectorConfig {
        LogCollectorConfig {
            tail_capacity: self.log_tail_lines,
            mirror_to_console: self.mirror_output,
            output_file: self.server_log_file.clone(),
            ..Default::default()
        }
    }
}

// Default value functions
fn default_startup_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_grace_period() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_probe_timeout() -> Duration {
    Duration::from_millis(1500)
}

fn default_log_tail_lines() -> usize {
    DEFAULT_TAIL_CAPACITY
}

fn default_true() -> bool {
    true
}

// Durations are written as "10s", "250ms" or "1m".
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            let millis: u64 = num.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num) = s.strip_suffix('s') {
            let secs: u64 = num.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
