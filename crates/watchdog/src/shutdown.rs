use nix::errno::Errno;
use nix::unistd::Pid;

use crate::launcher::ProcessHost;
use crate::registry::Registry;
use crate::types::ProcessState;

/// Result of tearing down the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
	/// Pids that received the kill signal.
	pub killed: Vec<Pid>,
	/// Pids that had already exited (`ESRCH`).
	pub already_gone: Vec<Pid>,
	/// Pids the signal could not be delivered to for another reason.
	pub failed: Vec<(Pid, Errno)>,
}

impl ShutdownReport {
	/// Number of kill calls issued.
	pub fn attempted(&self) -> usize {
		self.killed.len() + self.already_gone.len() + self.failed.len()
	}
}

/// Stops all restart activity: pending relaunches are discarded and every
/// record becomes `Terminated`. Returns the pids that were still tracked.
pub fn disarm(registry: &mut Registry) -> Vec<Pid> {
	let targets = registry.tracked_pids();
	for record in registry.iter_mut() {
		record.set_state(ProcessState::Terminated);
	}
	targets
}

/// Sends one kill to each target. Failures are logged, never fatal.
pub fn kill_all<H: ProcessHost>(host: &mut H, targets: &[Pid]) -> ShutdownReport {
	let mut report = ShutdownReport::default();
	for &pid in targets {
		match host.kill(pid) {
			Ok(()) => {
				tracing::debug!("killed pid {}", pid);
				report.killed.push(pid);
			}
			Err(Errno::ESRCH) => {
				tracing::warn!("pid {} already exited", pid);
				report.already_gone.push(pid);
			}
			Err(e) => {
				tracing::warn!("failed to kill pid {}: {}", pid, e);
				report.failed.push((pid, e));
			}
		}
	}
	report
}

/// Full teardown. Takes the registry by value, so it can only run once and
/// all argument storage is released when it returns.
pub fn shutdown<H: ProcessHost>(host: &mut H, mut registry: Registry) -> ShutdownReport {
	let targets = disarm(&mut registry);
	let report = kill_all(host, &targets);
	drop(registry);
	report
}
