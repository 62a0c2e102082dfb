//! Process existence checks.
//!
//! Used after teardown to confirm that nothing from the supervised group
//! survived, and by tests asserting the same.

use dobrika_common::HarnessResult;

/// Check if a process with the given PID exists.
///
/// On Unix this is `kill(pid, 0)`: no signal is sent, only existence and
/// permissions are checked. A zombie still counts as existing until reaped.
///
/// # Returns
///
/// * `Ok(true)` - process exists (including when we lack permission to signal it)
/// * `Ok(false)` - no such process
/// * `Err(_)` - the check itself failed
pub fn process_exists(pid: u32) -> HarnessResult<bool> {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        probe_unix(kill(Pid::from_raw(pid as i32), None))
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

/// Check if any process in the group `pgid` is still alive.
pub fn process_group_exists(pgid: u32) -> HarnessResult<bool> {
    #[cfg(unix)]
    {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        probe_unix(killpg(Pid::from_raw(pgid as i32), None))
    }

    // Windows has no cheap group query; the leader stands in for the group.
    #[cfg(windows)]
    {
        process_exists_windows(pgid)
    }
}

#[cfg(unix)]
fn probe_unix(result: nix::Result<()>) -> HarnessResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(std::io::Error::from(e).into()),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> HarnessResult<bool> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}
