//! Process-group termination primitives.
//!
//! The supervisor spawns the server as the leader of a new process group so
//! that every descendant can be signalled at once. On Unix the group id equals
//! the leader's pid. On Windows the child is created with
//! `CREATE_NEW_PROCESS_GROUP` and the group id is likewise the child's pid.

use dobrika_common::HarnessResult;

/// Ask every process in the group to shut down (SIGTERM on Unix,
/// CTRL_BREAK_EVENT on Windows).
pub fn terminate_group_gracefully(pgid: u32) -> HarnessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        killpg(Pid::from_raw(pgid as i32), Signal::SIGTERM).map_err(std::io::Error::from)?;
        Ok(())
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

        unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pgid) }
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(())
    }
}

/// Unconditionally kill the group (SIGKILL on Unix, TerminateProcess on the
/// group leader on Windows).
pub fn force_kill_group(pgid: u32) -> HarnessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL).map_err(std::io::Error::from)?;
        Ok(())
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, false, pgid)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        }
        Ok(())
    }
}
