//! Handle to a spawned server.

use crate::environment::LaunchEnvironment;
use dobrika_common::ServiceAddress;
use dobrika_log_collection::LogCollector;
use dobrika_monitoring::ReadyReport;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Child;
use tracing::{debug, warn};

/// A running server owned by whoever called
/// [`ProcessSupervisor::start`](crate::ProcessSupervisor::start).
///
/// Not `Clone`: exactly one owner decides when to stop it. Dropping a handle
/// that was never stopped kills the whole process group.
#[derive(Debug)]
pub struct ServerProcess {
    pub(crate) pid: u32,
    pub(crate) pgid: u32,
    pub(crate) address: ServiceAddress,
    pub(crate) env: LaunchEnvironment,
    pub(crate) storage_dir: PathBuf,
    pub(crate) owns_storage: bool,
    pub(crate) owned_storage: Option<TempDir>,
    pub(crate) child: Option<Child>,
    pub(crate) logs: LogCollector,
    pub(crate) ready: Option<ReadyReport>,
}

impl ServerProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Process-group id; equal to the pid of the group leader.
    pub fn pgid(&self) -> u32 {
        self.pgid
    }

    pub fn address(&self) -> &ServiceAddress {
        &self.address
    }

    /// `http://{addr}:{port}`
    pub fn base_url(&self) -> String {
        self.address.base_url()
    }

    pub fn env(&self) -> &LaunchEnvironment {
        &self.env
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Whether the supervisor created the storage directory (and will remove it).
    pub fn owns_storage(&self) -> bool {
        self.owns_storage
    }

    pub fn logs(&self) -> &LogCollector {
        &self.logs
    }

    pub fn logs_mut(&mut self) -> &mut LogCollector {
        &mut self.logs
    }

    /// What the health gate observed on startup.
    pub fn ready_report(&self) -> Option<&ReadyReport> {
        self.ready.as_ref()
    }

    /// True once `stop` has run.
    pub fn is_stopped(&self) -> bool {
        self.child.is_none()
    }

    /// Check whether the server is still alive without blocking.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Remove the storage directory if this handle created it. Errors are ignored.
    pub(crate) fn release_storage(&mut self) {
        if let Some(dir) = self.owned_storage.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "Removed server storage"),
                Err(e) => debug!(path = %path.display(), error = %e, "Failed to remove server storage"),
            }
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Ok(None) = child.try_wait() {
                warn!(pid = self.pid, "Server handle dropped without stop; killing process group");
                let _ = dobrika_process::force_kill_group(self.pgid);
            } else if let Ok(true) = dobrika_process::process_group_exists(self.pgid) {
                warn!(pgid = self.pgid, "Server handle dropped with live group members; killing them");
                let _ = dobrika_process::force_kill_group(self.pgid);
            }
        }
        self.release_storage();
    }
}
