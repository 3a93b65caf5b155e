//! Per-run process tracking and termination.
//!
//! Grounded on `cuenv-core`'s `tasks::process_registry::ProcessRegistry`:
//! the same SIGTERM-then-SIGKILL two-phase shutdown, scoped here to one
//! sandboxed run rather than a process-wide singleton -- a target's
//! timeout only needs to kill that target's own process group, not every
//! process the session has spawned.

use std::time::Duration;

/// Tracks (at most) one running child's PID for cooperative
/// cancellation/timeout, mirroring `ProcessRegistry`'s terminate sequence
/// at the scope of a single job instead of a global singleton.
pub struct ProcessGuard {
    pid: Option<u32>,
}

impl ProcessGuard {
    /// No process tracked yet.
    #[must_use]
    pub fn new() -> Self {
        Self { pid: None }
    }

    /// Record the just-spawned child's PID.
    pub fn track(&mut self, pid: u32) {
        self.pid = Some(pid);
    }

    /// Send SIGTERM, wait up to `timeout` for the process to exit, then
    /// SIGKILL if it hasn't.
    pub async fn terminate(&self, timeout: Duration) {
        let Some(pid) = self.pid else { return };

        send_term_signal(pid);

        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if !is_process_alive(pid) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        send_kill_signal(pid);
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn send_term_signal(pid: u32) {
    #[expect(unsafe_code, reason = "POSIX signal delivery has no safe wrapper for process-group targeting")]
    unsafe {
        libc::kill(-(pid as i32), libc::SIGTERM);
    }
}

#[cfg(unix)]
fn send_kill_signal(pid: u32) {
    #[expect(unsafe_code, reason = "POSIX signal delivery has no safe wrapper for process-group targeting")]
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    #[expect(unsafe_code, reason = "signal 0 is the standard POSIX existence check")]
    unsafe {
        libc::kill(pid as i32, 0) == 0
    }
}

#[cfg(windows)]
fn send_term_signal(pid: u32) {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};
    let mut system = System::new();
    let process_pid = Pid::from(pid as usize);
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[process_pid]), false, ProcessRefreshKind::nothing());
    if let Some(process) = system.process(process_pid) {
        let _ = process.kill_with(Signal::Term);
    }
}

#[cfg(windows)]
fn send_kill_signal(pid: u32) {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};
    let mut system = System::new();
    let process_pid = Pid::from(pid as usize);
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[process_pid]), false, ProcessRefreshKind::nothing());
    if let Some(process) = system.process(process_pid) {
        let _ = process.kill_with(Signal::Kill);
    }
}

#[cfg(windows)]
fn is_process_alive(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
    let mut system = System::new();
    let process_pid = Pid::from(pid as usize);
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[process_pid]), false, ProcessRefreshKind::nothing());
    system.process(process_pid).is_some()
}
