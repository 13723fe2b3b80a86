//! Process termination primitives.
//!
//! Benchmark processes run inside emulated network endpoints that hold
//! ports, namespaces, and file descriptors; an abandoned process leaks
//! those into the next scenario. Termination is therefore a ladder:
//! SIGTERM, bounded wait, SIGKILL.

use pepbench_common::{BenchError, BenchResult};

/// Terminate a process gracefully with SIGTERM.
pub fn terminate_gracefully(pid: u32) -> BenchResult<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| BenchError::stop_failed(pid, e.to_string()))
}

/// Force kill a process with SIGKILL.
pub fn force_kill(pid: u32) -> BenchResult<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGKILL)
        .map_err(|e| BenchError::stop_failed(pid, e.to_string()))
}

/// Check whether a process with the given PID exists.
///
/// Sends no signal (`kill(pid, 0)`); EPERM counts as existing.
pub fn process_exists(pid: u32) -> BenchResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(BenchError::stop_failed(
            pid,
            format!("failed to check process: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_exists() {
        assert!(process_exists(std::process::id()).unwrap());
    }

    #[test]
    fn test_nonexistent_process() {
        // PIDs this high are vanishingly unlikely to be live.
        assert!(!process_exists(9_999_999).unwrap());
    }
}
