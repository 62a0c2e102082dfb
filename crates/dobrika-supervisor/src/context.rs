//! Run-scoped harness context.
//!
//! Decides once per run whether the harness spawns the server itself or
//! talks to one that is already running, and hands every caller the same
//! base URL. Built by [`HarnessContext::acquire`] and torn down by
//! [`HarnessContext::release`].

use crate::config::SupervisorConfig;
use crate::environment::{DEFAULT_ADDR, ENV_ADDR, ENV_DB_PATH, ENV_PORT};
use crate::process::ServerProcess;
use crate::supervisor::{ProcessSupervisor, StartRequest};
use dobrika_common::{HarnessError, HarnessResult, ServiceAddress};
use dobrika_process::{pick_free_port, validate_executable};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub const ENV_RUN_SERVER: &str = "RUN_SERVER";
pub const ENV_BINARY: &str = "DOBRIKA_BINARY";
pub const ENV_HOST: &str = "DOBRIKA_HOST";

/// Port tried first when the harness spawns the server.
pub const DEFAULT_PREFERRED_PORT: u16 = 8088;

/// Preliminary readiness wait for a service the harness did not start.
pub const EXTERNAL_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Target selection, usually read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    /// Spawn the server (true) or use an external one (false).
    pub run_server: bool,
    pub binary: Option<PathBuf>,
    pub host: String,
    /// Preferred port when spawning; the exact port of an external service.
    pub port: Option<u16>,
    /// Storage directory; a temporary one is created when unset.
    pub db_path: Option<PathBuf>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            run_server: false,
            binary: None,
            host: DEFAULT_ADDR.to_string(),
            port: None,
            db_path: None,
        }
    }
}

impl HarnessOptions {
    /// Read `RUN_SERVER`, `DOBRIKA_BINARY`, `DOBRIKA_ADDR`/`DOBRIKA_HOST`,
    /// `DOBRIKA_PORT` and `DOBRIKA_DB_PATH`. Unparseable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let run_server = non_empty(ENV_RUN_SERVER)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let host = non_empty(ENV_ADDR)
            .or_else(|| non_empty(ENV_HOST))
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let port = non_empty(ENV_PORT).and_then(|s| s.trim().parse::<u16>().ok());

        Self {
            run_server,
            binary: non_empty(ENV_BINARY).map(PathBuf::from),
            host,
            port,
            db_path: non_empty(ENV_DB_PATH).map(PathBuf::from),
        }
    }

    pub fn address(&self) -> ServiceAddress {
        ServiceAddress::new(
            self.host.clone(),
            self.port.unwrap_or(DEFAULT_PREFERRED_PORT),
        )
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Debug)]
enum Target {
    Managed(ServerProcess),
    External(ServiceAddress),
}

/// The service under test for the duration of one run.
#[derive(Debug)]
pub struct HarnessContext {
    supervisor: ProcessSupervisor,
    target: Target,
}

impl HarnessContext {
    /// Start the server, or confirm the external one answers, and return a
    /// context pointing at it.
    ///
    /// An external service that is not healthy within
    /// [`EXTERNAL_PROBE_TIMEOUT`] yields [`HarnessError::ServiceUnavailable`].
    pub async fn acquire(options: HarnessOptions, config: SupervisorConfig) -> HarnessResult<Self> {
        let supervisor = ProcessSupervisor::new(config)?;
        Self::acquire_with(options, supervisor).await
    }

    pub async fn acquire_with(
        options: HarnessOptions,
        supervisor: ProcessSupervisor,
    ) -> HarnessResult<Self> {
        if !options.run_server {
            let address = options.address();
            let base_url = address.base_url();
            info!(url = %base_url, "Using externally managed service");

            supervisor
                .gate()
                .wait_healthy(&base_url, EXTERNAL_PROBE_TIMEOUT)
                .await
                .map_err(|e| match e {
                    HarnessError::HealthTimeout { url, last_error, .. } => {
                        HarnessError::service_unavailable(url, last_error)
                    }
                    other => other,
                })?;

            return Ok(Self {
                supervisor,
                target: Target::External(address),
            });
        }

        let binary = options.binary.clone().ok_or_else(|| {
            HarnessError::configuration(format!(
                "{} must be set when {} is enabled",
                ENV_BINARY, ENV_RUN_SERVER
            ))
        })?;
        if binary.as_os_str().is_empty() {
            return Err(HarnessError::configuration("Server binary path is empty"));
        }
        // Must fail before any socket is opened.
        let binary = validate_executable(&binary)?;

        let port = pick_free_port(Some(options.port.unwrap_or(DEFAULT_PREFERRED_PORT)))?;

        let mut request = StartRequest::new(binary, port).with_addr(options.host.clone());
        if let Some(dir) = &options.db_path {
            request = request.with_storage_dir(dir.clone());
        }

        let process = supervisor.start(request).await?;
        Ok(Self {
            supervisor,
            target: Target::Managed(process),
        })
    }

    pub fn address(&self) -> &ServiceAddress {
        match &self.target {
            Target::Managed(process) => process.address(),
            Target::External(address) => address,
        }
    }

    pub fn base_url(&self) -> String {
        self.address().base_url()
    }

    /// The spawned server, if this context started one.
    pub fn server(&self) -> Option<&ServerProcess> {
        match &self.target {
            Target::Managed(process) => Some(process),
            Target::External(_) => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self.target, Target::Managed(_))
    }

    /// Stop the server if this context started it. External services are
    /// left alone.
    pub async fn release(mut self) {
        if let Target::Managed(process) = &mut self.target {
            self.supervisor.stop(process).await;
        }
    }
}
