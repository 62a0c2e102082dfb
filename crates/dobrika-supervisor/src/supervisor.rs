//! Server lifecycle: spawn, health-gate, teardown.

use crate::config::SupervisorConfig;
use crate::environment::{LaunchEnvironment, DEFAULT_ADDR};
use crate::process::ServerProcess;
use dobrika_common::{HarnessError, HarnessResult, ServiceAddress};
use dobrika_log_collection::{LogCollector, StreamType};
use dobrika_monitoring::HealthGate;
use dobrika_process::{force_kill_group, process_group_exists, terminate_group_gracefully, validate_executable};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How long to wait for the group leader after SIGKILL.
const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(5);

const STORAGE_PREFIX: &str = "dobrika-db-";

/// What to launch and where it should listen.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub addr: String,
    pub port: u16,
    /// Existing storage directory. When `None` a temporary one is created
    /// and removed on stop.
    pub storage_dir: Option<PathBuf>,
    /// Highest-precedence variables after the launch's own addr/port/storage.
    pub env_overrides: BTreeMap<String, String>,
}

impl StartRequest {
    pub fn new(binary: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            addr: DEFAULT_ADDR.to_string(),
            port,
            storage_dir: None,
            env_overrides: BTreeMap::new(),
        }
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }
}

/// Starts and stops the server under test.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    gate: HealthGate,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> HarnessResult<Self> {
        let gate = HealthGate::new(config.health_gate_config());
        Self::with_gate(config, gate)
    }

    /// Use a custom gate, e.g. one with a stubbed probe.
    pub fn with_gate(config: SupervisorConfig, gate: HealthGate) -> HarnessResult<Self> {
        config
            .validate()
            .map_err(|e| HarnessError::configuration(format!("{:#}", e)))?;
        Ok(Self { config, gate })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn gate(&self) -> &HealthGate {
        &self.gate
    }

    /// Spawn the server and wait until it reports healthy.
    ///
    /// Nothing is spawned when the binary path is empty or missing. If the
    /// health gate expires the buffered output is dumped to stderr, the
    /// process group is killed, owned storage is removed and the
    /// `HealthTimeout` is returned.
    pub async fn start(&self, request: StartRequest) -> HarnessResult<ServerProcess> {
        if request.binary.as_os_str().is_empty() {
            return Err(HarnessError::configuration("Server binary path is empty"));
        }
        let binary = validate_executable(&request.binary)?;

        let (storage_dir, owned_storage) = match request.storage_dir {
            Some(dir) => (dir, None),
            None => {
                let dir = tempfile::Builder::new().prefix(STORAGE_PREFIX).tempdir()?;
                (dir.path().to_path_buf(), Some(dir))
            }
        };

        let mut overrides = self.config.environment.clone();
        overrides.extend(request.env_overrides);
        let env = LaunchEnvironment::from_current(&overrides, &request.addr, request.port, &storage_dir);

        let mut logs = LogCollector::new(&self.config.log_collector_config())?;

        let mut cmd = Command::new(&binary);
        cmd.args(&request.args)
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = binary.parent() {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| HarnessError::spawn_failed(&binary, e.to_string()))?;

        let pid = child
            .id()
            .ok_or_else(|| HarnessError::spawn_failed(&binary, "process exited before its pid was read"))?;

        if let Some(stdout) = child.stdout.take() {
            logs.attach(stdout, StreamType::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            logs.attach(stderr, StreamType::Stderr);
        }

        let address = ServiceAddress::new(request.addr, request.port);
        info!(
            binary = %binary.display(),
            pid,
            address = %address,
            storage = %storage_dir.display(),
            "Server spawned"
        );

        let mut process = ServerProcess {
            pid,
            pgid: pid,
            address,
            env,
            storage_dir,
            owns_storage: owned_storage.is_some(),
            owned_storage,
            child: Some(child),
            logs,
            ready: None,
        };

        match self
            .gate
            .wait_healthy(&process.base_url(), self.config.startup_timeout)
            .await
        {
            Ok(report) => {
                process.ready = Some(report);
                Ok(process)
            }
            Err(e) => {
                error!(pid, error = %e, "Server failed to become healthy");
                process.logs.dump_tail_to_stderr();
                self.abort(&mut process).await;
                Err(e)
            }
        }
    }

    /// Stop the server: graceful signal to the group, then SIGKILL after the
    /// grace period. Removes storage the supervisor created.
    ///
    /// Idempotent and infallible; teardown problems are logged and swallowed.
    pub async fn stop(&self, process: &mut ServerProcess) {
        let Some(mut child) = process.child.take() else {
            debug!(pid = process.pid, "Server already stopped");
            process.release_storage();
            return;
        };

        let pgid = process.pgid;
        match child.try_wait() {
            Ok(Some(status)) => {
                info!(pid = process.pid, %status, "Server had already exited");
            }
            _ => {
                debug!(pid = process.pid, "Sending graceful stop to process group");
                if let Err(e) = terminate_group_gracefully(pgid) {
                    debug!(pgid, error = %e, "Graceful signal failed");
                }

                match timeout(self.config.grace_period, child.wait()).await {
                    Ok(Ok(status)) => info!(pid = process.pid, %status, "Server stopped"),
                    Ok(Err(e)) => warn!(pid = process.pid, error = %e, "Failed waiting for server exit"),
                    Err(_) => {
                        warn!(
                            pid = process.pid,
                            grace_period = ?self.config.grace_period,
                            "Server ignored graceful stop; killing process group"
                        );
                        kill_and_reap(&mut child, pgid).await;
                    }
                }
            }
        }

        sweep_group(pgid);
        process.release_storage();
    }

    /// Forced teardown after a failed start.
    async fn abort(&self, process: &mut ServerProcess) {
        if let Some(mut child) = process.child.take() {
            kill_and_reap(&mut child, process.pgid).await;
        }
        sweep_group(process.pgid);
        process.release_storage();
    }
}

async fn kill_and_reap(child: &mut Child, pgid: u32) {
    if let Err(e) = force_kill_group(pgid) {
        debug!(pgid, error = %e, "Force kill of process group failed");
    }
    match timeout(FORCE_KILL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!(pgid, %status, "Server reaped after force kill"),
        Ok(Err(e)) => warn!(pgid, error = %e, "Failed waiting for killed server"),
        Err(_) => error!(pgid, "Server still running after force kill"),
    }
}

/// Kill group members that outlived the leader.
///
/// The leader may already be reaped here. Its pid stays reserved as a pgid
/// while any member lives, so the kill can only reach an unrelated group if
/// every member exited and the id was reused in between. That window is accepted.
fn sweep_group(pgid: u32) {
    if let Ok(true) = process_group_exists(pgid) {
        debug!(pgid, "Killing leftover members of process group");
        let _ = force_kill_group(pgid);
    }
}
