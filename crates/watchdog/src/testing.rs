//! Scripted [`ProcessHost`] for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use nix::errno::Errno;
use nix::unistd::Pid;
use tokio::time::Instant;

use crate::error::{LaunchError, WaitError};
use crate::launcher::ProcessHost;
use crate::registry::Record;
use crate::signals::{Notice, NoticeSender};
use crate::types::{Reaped, Termination};

#[derive(Debug, Clone)]
pub struct Launch {
	pub index: usize,
	pub pid: Pid,
	pub at: Instant,
}

#[derive(Default)]
struct State {
	next_pid: i32,
	alive: HashSet<Pid>,
	pending: VecDeque<Reaped>,
	launches: Vec<Launch>,
	attempts: usize,
	kills: Vec<Pid>,
	fail_launches: u32,
	wait_error: Option<Errno>,
	auto_exit: Option<i32>,
	notices: Option<NoticeSender>,
}

/// Hands out increasing pids and only terminates processes when told to.
#[derive(Clone)]
pub struct FakeHost {
	state: Arc<Mutex<State>>,
}

impl FakeHost {
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(State {
				next_pid: 1000,
				..State::default()
			})),
		}
	}

	/// Also send `Notice::ChildExited` whenever a process exits.
	pub fn notifying(self, tx: NoticeSender) -> Self {
		self.state.lock().unwrap().notices = Some(tx);
		self
	}

	/// Every launched process exits with `code` right away.
	pub fn exiting_immediately(self, code: i32) -> Self {
		self.state.lock().unwrap().auto_exit = Some(code);
		self
	}

	pub fn exit(&self, pid: Pid, code: i32) {
		let mut state = self.state.lock().unwrap();
		terminate(&mut state, pid, Termination::Exited(code));
	}

	pub fn fail_next_launches(&self, n: u32) {
		self.state.lock().unwrap().fail_launches = n;
	}

	pub fn fail_wait(&self, errno: Errno) {
		self.state.lock().unwrap().wait_error = Some(errno);
	}

	pub fn launches(&self) -> Vec<Launch> {
		self.state.lock().unwrap().launches.clone()
	}

	pub fn attempts(&self) -> usize {
		self.state.lock().unwrap().attempts
	}

	pub fn kills(&self) -> Vec<Pid> {
		self.state.lock().unwrap().kills.clone()
	}
}

fn terminate(state: &mut State, pid: Pid, termination: Termination) {
	state.alive.remove(&pid);
	state.pending.push_back(Reaped { pid, termination });
	if let Some(tx) = &state.notices {
		let _ = tx.send(Notice::ChildExited);
	}
}

impl ProcessHost for FakeHost {
	fn launch(&mut self, record: &Record) -> Result<Pid, LaunchError> {
		let mut state = self.state.lock().unwrap();
		state.attempts += 1;
		if state.fail_launches > 0 {
			state.fail_launches -= 1;
			return Err(LaunchError::ForkFailed(Errno::EAGAIN));
		}

		let pid = Pid::from_raw(state.next_pid);
		state.next_pid += 1;
		state.alive.insert(pid);
		state.launches.push(Launch {
			index: record.index(),
			pid,
			at: Instant::now(),
		});
		if let Some(code) = state.auto_exit {
			terminate(&mut state, pid, Termination::Exited(code));
		}
		Ok(pid)
	}

	fn try_reap(&mut self) -> Result<Option<Reaped>, WaitError> {
		let mut state = self.state.lock().unwrap();
		if let Some(errno) = state.wait_error {
			return Err(WaitError(errno));
		}
		Ok(state.pending.pop_front())
	}

	fn kill(&mut self, pid: Pid) -> Result<(), Errno> {
		let mut state = self.state.lock().unwrap();
		state.kills.push(pid);
		if state.alive.remove(&pid) {
			Ok(())
		} else {
			Err(Errno::ESRCH)
		}
	}
}
