use nix::unistd::Pid;
use tokio::time::Instant;

use crate::error::ConfigError;
use crate::types::{ProcessState, RecordStatus, Termination};

/// Historical upper bound on supervised commands.
pub const DEFAULT_CAPACITY: usize = 128;

/// One supervised command.
#[derive(Debug)]
pub struct Record {
	index: usize,
	command: String,
	args: Vec<String>,
	state: ProcessState,
	started_at: Option<Instant>,
	last_termination: Option<Termination>,
	rapid_failures: u32,
	restarts: u32,
}

impl Record {
	fn new(index: usize, command: String) -> Self {
		Self {
			index,
			command,
			args: Vec::new(),
			state: ProcessState::Configured,
			started_at: None,
			last_termination: None,
			rapid_failures: 0,
			restarts: 0,
		}
	}

	pub fn index(&self) -> usize {
		self.index
	}

	pub fn command(&self) -> &str {
		&self.command
	}

	/// Full argument vector, `argv[0]` included. May be empty.
	pub fn args(&self) -> &[String] {
		&self.args
	}

	pub fn state(&self) -> ProcessState {
		self.state
	}

	pub fn pid(&self) -> Option<Pid> {
		self.state.pid()
	}

	pub fn started_at(&self) -> Option<Instant> {
		self.started_at
	}

	/// How the previous process of this record ended.
	pub fn last_termination(&self) -> Option<Termination> {
		self.last_termination
	}

	pub fn rapid_failures(&self) -> u32 {
		self.rapid_failures
	}

	pub fn restarts(&self) -> u32 {
		self.restarts
	}

	pub fn status(&self) -> RecordStatus {
		RecordStatus {
			index: self.index,
			command: self.command.clone(),
			state: self.state,
			pid: self.pid(),
			last_termination: self.last_termination,
			restarts: self.restarts,
		}
	}

	pub(crate) fn set_running(&mut self, pid: Pid, now: Instant) {
		if self.started_at.is_some() {
			self.restarts += 1;
		}
		self.state = ProcessState::Running { pid };
		self.started_at = Some(now);
	}

	pub(crate) fn set_exited(&mut self, termination: Termination) {
		self.state = ProcessState::Exited { termination };
		self.last_termination = Some(termination);
	}

	pub(crate) fn set_state(&mut self, state: ProcessState) {
		self.state = state;
	}

	pub(crate) fn set_rapid_failures(&mut self, n: u32) {
		self.rapid_failures = n;
	}
}

/// Collects commands and arguments during configuration.
///
/// Argument vectors can only grow here; [`RegistryBuilder::build`] freezes
/// them into a [`Registry`].
#[derive(Debug)]
pub struct RegistryBuilder {
	capacity: usize,
	records: Vec<Record>,
}

impl Default for RegistryBuilder {
	fn default() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}
}

impl RegistryBuilder {
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			capacity,
			records: Vec::new(),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Appends a new record for `path` and returns its index.
	pub fn add_command(&mut self, path: impl Into<String>) -> Result<usize, ConfigError> {
		if self.records.len() >= self.capacity {
			return Err(ConfigError::CapacityExceeded {
				capacity: self.capacity,
			});
		}
		let path = checked(path.into())?;
		let index = self.records.len();
		self.records.push(Record::new(index, path));
		Ok(index)
	}

	/// Appends `arg` to the argument vector of the last added record.
	pub fn append_argument(&mut self, arg: impl Into<String>) -> Result<(), ConfigError> {
		let arg = checked(arg.into())?;
		let record = self.records.last_mut().ok_or(ConfigError::NoActiveRecord)?;
		record.args.push(arg);
		Ok(())
	}

	pub fn build(self) -> Registry {
		Registry {
			records: self.records,
		}
	}
}

fn checked(s: String) -> Result<String, ConfigError> {
	if s.contains('\0') {
		Err(ConfigError::InvalidString(s))
	} else {
		Ok(s)
	}
}

/// Frozen, ordered set of supervised records.
#[derive(Debug)]
pub struct Registry {
	records: Vec<Record>,
}

impl Registry {
	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::default()
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&Record> {
		self.records.get(index)
	}

	pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Record> {
		self.records.get_mut(index)
	}

	/// Index of the record currently running as `pid`.
	pub fn find_by_pid(&self, pid: Pid) -> Option<usize> {
		self.records
			.iter()
			.position(|r| r.pid() == Some(pid))
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Record> {
		self.records.iter()
	}

	pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Record> {
		self.records.iter_mut()
	}

	pub fn tracked_pids(&self) -> Vec<Pid> {
		self.records.iter().filter_map(Record::pid).collect()
	}

	/// True while at least one record is running or awaiting relaunch.
	pub fn has_supervised(&self) -> bool {
		self.records.iter().any(|r| r.state.is_supervised())
	}

	pub fn statuses(&self) -> Vec<RecordStatus> {
		self.records.iter().map(Record::status).collect()
	}
}

impl<'a> IntoIterator for &'a Registry {
	type Item = &'a Record;
	type IntoIter = std::slice::Iter<'a, Record>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}
