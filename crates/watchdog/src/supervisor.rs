use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::SupervisorError;
use crate::launcher::{ProcessHost, UnixHost};
use crate::policy::RestartPolicy;
use crate::reaper::Reaper;
use crate::registry::Registry;
use crate::shutdown::{self, ShutdownReport};
use crate::signals::{self, Notice, NoticeReceiver};
use crate::types::RecordStatus;

/// Exit status after a shutdown request.
pub const EXIT_OK: i32 = 0;
/// Exit status when configuration is rejected before anything is launched.
pub const EXIT_CONFIG: i32 = 255;
/// Exit status for system failures (wait, signal setup, detach).
pub const EXIT_SYSTEM: i32 = 254;
/// Exit status when no record is running or awaiting relaunch.
pub const EXIT_NO_PROCESSES: i32 = 253;

/// How [`Supervisor::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
	Shutdown(ShutdownReport),
	NoProcessesRemain,
}

impl Exit {
	pub fn code(&self) -> i32 {
		match self {
			Exit::Shutdown(_) => EXIT_OK,
			Exit::NoProcessesRemain => EXIT_NO_PROCESSES,
		}
	}
}

impl std::fmt::Display for Exit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Exit::Shutdown(report) => write!(
				f,
				"shut down: {} killed, {} already gone, {} failed",
				report.killed.len(),
				report.already_gone.len(),
				report.failed.len()
			),
			Exit::NoProcessesRemain => write!(f, "no processes remain to supervise"),
		}
	}
}

impl SupervisorError {
	pub fn code(&self) -> i32 {
		EXIT_SYSTEM
	}
}

/// Owns the registry and drives it from launch to shutdown.
///
/// All registry reads and writes happen on the task running
/// [`Supervisor::run`]; the outside world only talks to it through the
/// notice channel and observes it through [`Supervisor::subscribe`].
pub struct Supervisor<H: ProcessHost = UnixHost> {
	registry: Registry,
	reaper: Reaper,
	host: H,
	status: watch::Sender<Vec<RecordStatus>>,
}

impl Supervisor<UnixHost> {
	pub fn new(registry: Registry, policy: RestartPolicy) -> Self {
		Self::with_host(registry, policy, UnixHost)
	}
}

impl<H: ProcessHost> Supervisor<H> {
	pub fn with_host(registry: Registry, policy: RestartPolicy, host: H) -> Self {
		let (status, _) = watch::channel(registry.statuses());
		Self {
			registry,
			reaper: Reaper::new(policy),
			host,
			status,
		}
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn policy(&self) -> &RestartPolicy {
		self.reaper.policy()
	}

	/// Record snapshots, republished after every change.
	pub fn subscribe(&self) -> watch::Receiver<Vec<RecordStatus>> {
		self.status.subscribe()
	}

	/// Initial launch of every record, in configuration order.
	pub fn start(&mut self) {
		let now = Instant::now();
		for index in 0..self.registry.len() {
			if let Some(record) = self.registry.get(index) {
				tracing::info!("process {}: {} {:?}", index, record.command(), record.args());
			}
			self.reaper.launch(&mut self.host, &mut self.registry, index, now);
		}
		self.publish();
	}

	/// Launches everything, then supervises until a shutdown notice, a fatal
	/// wait error, or until no record is left to supervise.
	pub async fn run(mut self, mut notices: NoticeReceiver) -> Result<Exit, SupervisorError> {
		self.start();

		loop {
			if !self.registry.has_supervised() {
				tracing::warn!("no processes remain to supervise");
				return Ok(Exit::NoProcessesRemain);
			}

			let next_due = self.reaper.next_due(&self.registry);

			tokio::select! {
				biased;
				notice = notices.recv() => match notice {
					Some(Notice::ChildExited) => {
						let drained = self.reaper.drain(&mut self.host, &mut self.registry, Instant::now());
						if let Err(e) = drained {
							tracing::error!("{}, stopping", e);
							self.shutdown();
							return Err(e.into());
						}
					}
					Some(Notice::Shutdown) => {
						return Ok(Exit::Shutdown(self.shutdown()));
					}
					None => {
						tracing::warn!("notice channel closed, shutting down");
						return Ok(Exit::Shutdown(self.shutdown()));
					}
				},
				_ = sleep_until(next_due) => {
					self.reaper.restart_due(&mut self.host, &mut self.registry, Instant::now());
				}
			}

			self.publish();
		}
	}

	fn shutdown(self) -> ShutdownReport {
		let Supervisor {
			mut registry,
			mut host,
			status,
			..
		} = self;

		let targets = shutdown::disarm(&mut registry);
		status.send_replace(registry.statuses());
		tracing::info!("shutting down, killing {} processes", targets.len());

		let report = shutdown::kill_all(&mut host, &targets);
		drop(registry);
		report
	}

	fn publish(&self) {
		self.status.send_replace(self.registry.statuses());
	}
}

async fn sleep_until(due: Option<Instant>) {
	match due {
		Some(due) => tokio::time::sleep_until(due).await,
		None => std::future::pending::<()>().await,
	}
}

/// Runs `registry` under the real OS: installs the signal relay, launches
/// every command and supervises until SIGINT/SIGTERM.
pub async fn supervise(registry: Registry, policy: RestartPolicy) -> Result<Exit, SupervisorError> {
	let (tx, rx) = signals::channel();
	let relay = signals::relay(tx).map_err(SupervisorError::Signals)?;

	let supervisor = Supervisor::new(registry, policy);
	tracing::debug!(
		"restart delay {:?}, min uptime {:?}",
		supervisor.policy().delay,
		supervisor.policy().min_uptime
	);
	let exit = supervisor.run(rx).await;
	relay.abort();
	exit
}
