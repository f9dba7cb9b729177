//! Stray office processes.
//!
//! The report workbook must not be open in another Excel instance while it
//! is edited on disk or through automation. [`ProcessLockGuard`] terminates
//! leftover office processes when it is acquired and again when it is
//! released or dropped.

use std::thread;
use std::time::{Duration, Instant};

use sysinfo::{Pid, Signal, System};
use tracing::{debug, info, warn};

use crate::config::ProcessConfig;

const EXIT_POLL: Duration = Duration::from_millis(100);

/// Something that can stop running processes by executable name
pub trait ProcessTerminator {
    /// Stop every process whose name matches one of `names`
    /// (case-insensitive) and return how many were found
    fn terminate_matching(&mut self, names: &[String]) -> usize;
}

impl<T: ProcessTerminator + ?Sized> ProcessTerminator for &mut T {
    fn terminate_matching(&mut self, names: &[String]) -> usize {
        (**self).terminate_matching(names)
    }
}

/// Terminates processes of the local machine through `sysinfo`.
///
/// Each process is first asked to terminate; whatever is still alive after
/// the kill timeout is killed.
pub struct SystemProcesses {
    system: System,
    kill_timeout: Duration,
}

impl SystemProcesses {
    pub fn new(kill_timeout: Duration) -> Self {
        Self {
            system: System::new(),
            kill_timeout,
        }
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        Self::new(config.kill_timeout())
    }
}

impl ProcessTerminator for SystemProcesses {
    fn terminate_matching(&mut self, names: &[String]) -> usize {
        self.system.refresh_processes();
        let targets: Vec<Pid> = self
            .system
            .processes()
            .values()
            .filter(|process| {
                names
                    .iter()
                    .any(|name| process.name().eq_ignore_ascii_case(name))
            })
            .map(|process| process.pid())
            .collect();
        if targets.is_empty() {
            return 0;
        }

        for pid in &targets {
            if let Some(process) = self.system.process(*pid) {
                info!(pid = pid.as_u32(), name = process.name(), "terminating office process");
                // platforms without SIGTERM get a plain kill
                if process.kill_with(Signal::Term).is_none() {
                    process.kill();
                }
            }
        }

        let deadline = Instant::now() + self.kill_timeout;
        let mut alive = targets.clone();
        while !alive.is_empty() && Instant::now() < deadline {
            thread::sleep(EXIT_POLL);
            alive.retain(|pid| self.system.refresh_process(*pid));
        }
        for pid in &alive {
            if let Some(process) = self.system.process(*pid) {
                warn!(pid = pid.as_u32(), name = process.name(), "process ignored terminate, killing");
                process.kill();
            }
        }

        targets.len()
    }
}

/// Scoped exclusion of stray office processes.
///
/// Acquiring sweeps matching processes; releasing (or dropping, including
/// during unwinding) sweeps again. Nested guards borrow the terminator of
/// the enclosing one through [`terminator`](Self::terminator).
pub struct ProcessLockGuard<T: ProcessTerminator> {
    terminator: T,
    names: Vec<String>,
    grace: Duration,
    released: bool,
}

impl<T: ProcessTerminator> ProcessLockGuard<T> {
    pub fn acquire(terminator: T, config: &ProcessConfig) -> Self {
        let mut guard = Self {
            terminator,
            names: config.names.clone(),
            grace: config.grace(),
            released: false,
        };
        guard.sweep("acquire");
        guard
    }

    /// The terminator this guard sweeps with
    pub fn terminator(&mut self) -> &mut T {
        &mut self.terminator
    }

    /// Sweep now instead of on drop
    pub fn release(mut self) {
        self.sweep("release");
        self.released = true;
    }

    fn sweep(&mut self, phase: &str) {
        let stopped = self.terminator.terminate_matching(&self.names);
        if stopped == 0 {
            debug!(phase, "no stray office processes");
            return;
        }
        info!(phase, stopped, "stopped stray office processes");
        if !self.grace.is_zero() {
            thread::sleep(self.grace);
        }
    }
}

impl<T: ProcessTerminator> Drop for ProcessLockGuard<T> {
    fn drop(&mut self) {
        if !self.released {
            self.sweep("drop");
        }
    }
}
