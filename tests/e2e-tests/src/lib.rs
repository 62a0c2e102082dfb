// E2E test support for the Dobrika harness


use dobrika_supervisor::{ProcessSupervisor, StartRequest, SupervisorConfig};
use dobrika_workload::TaskDocument;
use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Get the path to the STUBSERVER binary
pub fn get_stubserver_path() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current exe path")
        .parent()
        .expect("Failed to get parent dir")
        .to_path_buf();

    // If we're in deps/, go up one level
    if path.ends_with("deps") {
        path.pop();
    }

    #[cfg(windows)]
    path.push("stubserver.exe");

    #[cfg(not(windows))]
    path.push("stubserver");

    if !path.exists() {
        panic!("STUBSERVER binary not found at: {}", path.display());
    }

    path
}

/// Supervisor settings scaled down for tests: 2 s startup, 2 s grace,
/// 100 ms polling, no console mirroring.
pub fn test_config() -> SupervisorConfig {
    SupervisorConfig {
        startup_timeout: Duration::from_secs(2),
        grace_period: Duration::from_secs(2),
        poll_interval: Duration::from_millis(100),
        probe_timeout: Duration::from_millis(500),
        mirror_output: false,
        ..Default::default()
    }
}

pub fn supervisor(config: SupervisorConfig) -> ProcessSupervisor {
    ProcessSupervisor::new(config).expect("Invalid supervisor config")
}

/// A request for the stub server on a free port with the given flags.
pub fn stub_request<I, S>(args: I) -> StartRequest
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let port = dobrika_process::pick_free_port(None).expect("Failed to pick a port");
    StartRequest::new(get_stubserver_path(), port).with_args(args)
}

/// Pid and storage directory written by `stubserver --pid-file`, once both
/// lines are present.
pub fn read_pid_file(path: &Path) -> Option<(u32, PathBuf)> {
    let content = std::fs::read_to_string(path).ok()?;
    if !content.ends_with('\n') {
        return None;
    }
    let mut lines = content.lines();
    let pid = lines.next()?.trim().parse().ok()?;
    let storage = lines.next()?.trim();
    if storage.is_empty() {
        return None;
    }
    Some((pid, PathBuf::from(storage)))
}

/// `n` small index documents.
pub fn sample_tasks(n: usize) -> Vec<TaskDocument> {
    (0..n)
        .map(|i| TaskDocument {
            task_id: format!("e2e_task_{}", i),
            task_name: format!("Repair bicycle {}", i),
            task_desc: "Replace chain, adjust brakes".to_string(),
            task_type: "TT_OnlineTask".to_string(),
            task_tags: Some(vec!["bike".to_string(), "repair".to_string()]),
            geo_data: Some("55.7558,37.6173".to_string()),
            extra: Default::default(),
        })
        .collect()
}

/// Poll `condition` every 20 ms until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
