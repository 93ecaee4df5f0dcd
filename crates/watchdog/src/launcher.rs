use std::ffi::CString;
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::{LaunchError, WaitError};
use crate::registry::Record;
use crate::types::{Reaped, Termination};

/// Exit status of a child whose `execv` failed.
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// The OS operations the supervisor performs on its children.
///
/// [`UnixHost`] is the real implementation; tests substitute a scripted one.
pub trait ProcessHost {
	/// Starts `record` as a new process.
	fn launch(&mut self, record: &Record) -> Result<Pid, LaunchError>;

	/// Consumes one pending termination without blocking.
	/// `Ok(None)` means nothing is pending, including "no children at all".
	fn try_reap(&mut self) -> Result<Option<Reaped>, WaitError>;

	/// Sends the forced-termination signal.
	fn kill(&mut self, pid: Pid) -> Result<(), Errno>;
}

/// fork/execv launcher and `waitpid` reaper.
#[derive(Debug, Default)]
pub struct UnixHost;

impl ProcessHost for UnixHost {
	fn launch(&mut self, record: &Record) -> Result<Pid, LaunchError> {
		let image = ProcessImage::new(record)?;

		// SAFETY: the child branch only calls execv, write and _exit.
		match unsafe { fork() } {
			Ok(ForkResult::Parent { child }) => Ok(child),
			Ok(ForkResult::Child) => image.replace(),
			Err(e) => Err(LaunchError::ForkFailed(e)),
		}
	}

	fn try_reap(&mut self) -> Result<Option<Reaped>, WaitError> {
		loop {
			match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::Exited(pid, code)) => {
					return Ok(Some(Reaped {
						pid,
						termination: Termination::Exited(code),
					}))
				}
				Ok(WaitStatus::Signaled(pid, signal, _)) => {
					return Ok(Some(Reaped {
						pid,
						termination: Termination::Signaled(signal),
					}))
				}
				Ok(WaitStatus::StillAlive) => return Ok(None),
				Ok(other) => {
					tracing::debug!("ignoring wait status {:?}", other);
				}
				Err(Errno::ECHILD) => return Ok(None),
				Err(Errno::EINTR) => {}
				Err(e) => return Err(WaitError(e)),
			}
		}
	}

	fn kill(&mut self, pid: Pid) -> Result<(), Errno> {
		kill(pid, Signal::SIGKILL)
	}
}

/// Everything the child needs, allocated before the fork.
struct ProcessImage {
	path: CString,
	argv: Vec<CString>,
	diagnostic: Vec<u8>,
}

impl ProcessImage {
	fn new(record: &Record) -> Result<Self, LaunchError> {
		let path = c_string(record.command())?;
		let argv = if record.args().is_empty() {
			vec![path.clone()]
		} else {
			record
				.args()
				.iter()
				.map(|a| c_string(a))
				.collect::<Result<Vec<_>, _>>()?
		};
		let diagnostic = format!("watchdog: failed to exec {}\n", record.command()).into_bytes();
		Ok(Self {
			path,
			argv,
			diagnostic,
		})
	}

	/// Runs in the forked child. Never returns to supervisor code.
	fn replace(&self) -> ! {
		let _ = nix::unistd::execv(&self.path, &self.argv);
		let _ = nix::unistd::write(std::io::stderr().as_fd(), &self.diagnostic);
		// SAFETY: skips atexit handlers and stdio flushing inherited from the parent.
		unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
	}
}

fn c_string(s: &str) -> Result<CString, LaunchError> {
	CString::new(s).map_err(|_| LaunchError::InvalidString(s.to_string()))
}
