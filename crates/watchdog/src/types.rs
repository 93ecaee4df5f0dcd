use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::time::Instant;

/// How a child process ended, as reported by `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
	Exited(i32),
	Signaled(Signal),
}

impl std::fmt::Display for Termination {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Termination::Exited(code) => write!(f, "exit {}", code),
			Termination::Signaled(sig) => write!(f, "signal {}", sig),
		}
	}
}

/// A termination consumed from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
	pub pid: Pid,
	pub termination: Termination,
}

/// Lifecycle of one supervised record.
///
/// ```text
/// Configured ─► Running ─► Exited ─► RestartPending ─► Running ─► …
///                                          │
///                                          └─► Abandoned (crash-loop threshold)
/// any ─► Terminated (shutdown)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
	Configured,
	Running { pid: Pid },
	/// Reaped but not yet scheduled. Only held while a termination is being
	/// applied, so the status feed never carries it; see
	/// [`RecordStatus::last_termination`] for the most recent exit.
	Exited { termination: Termination },
	RestartPending { due: Instant },
	Abandoned,
	Terminated,
}

impl ProcessState {
	pub fn is_running(&self) -> bool {
		matches!(self, ProcessState::Running { .. })
	}

	pub fn pid(&self) -> Option<Pid> {
		match self {
			ProcessState::Running { pid } => Some(*pid),
			_ => None,
		}
	}

	/// Running, or waiting to be relaunched.
	pub fn is_supervised(&self) -> bool {
		matches!(
			self,
			ProcessState::Running { .. } | ProcessState::RestartPending { .. }
		)
	}
}

/// Snapshot of a record published on the status feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStatus {
	pub index: usize,
	pub command: String,
	pub state: ProcessState,
	pub pid: Option<Pid>,
	pub last_termination: Option<Termination>,
	pub restarts: u32,
}
