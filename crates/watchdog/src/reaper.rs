use std::time::Duration;

use nix::unistd::Pid;
use tokio::time::Instant;

use crate::error::{LaunchError, WaitError};
use crate::launcher::ProcessHost;
use crate::policy::{RestartPolicy, Verdict};
use crate::registry::{Record, Registry};
use crate::types::{ProcessState, Reaped};

/// Turns terminations into scheduled relaunches, and due relaunches into
/// running processes.
///
/// The reaper never blocks: the supervisor loop decides when to call
/// [`Reaper::drain`] (a child exited) and [`Reaper::restart_due`] (the
/// earliest deadline from [`Reaper::next_due`] passed).
#[derive(Debug, Clone)]
pub struct Reaper {
	policy: RestartPolicy,
}

impl Reaper {
	pub fn new(policy: RestartPolicy) -> Self {
		Self { policy }
	}

	pub fn policy(&self) -> &RestartPolicy {
		&self.policy
	}

	/// Launches record `index`. A failed launch is rescheduled through the
	/// restart policy like a rapid failure.
	pub fn launch<H: ProcessHost>(
		&self,
		host: &mut H,
		registry: &mut Registry,
		index: usize,
		now: Instant,
	) -> Option<Result<Pid, LaunchError>> {
		let record = registry.get_mut(index)?;
		let result = host.launch(record);
		match &result {
			Ok(pid) => {
				record.set_running(*pid, now);
				tracing::info!("started {} as pid {}", record.command(), pid);
			}
			Err(e) => {
				tracing::warn!("failed to launch {}: {}", record.command(), e);
				self.schedule(record, None, now);
			}
		}
		Some(result)
	}

	/// Consumes every pending termination. Returns how many were reaped,
	/// including ones that belonged to no record.
	pub fn drain<H: ProcessHost>(
		&self,
		host: &mut H,
		registry: &mut Registry,
		now: Instant,
	) -> Result<usize, WaitError> {
		let mut reaped = 0;
		while let Some(event) = host.try_reap()? {
			reaped += 1;
			self.on_termination(registry, event, now);
		}
		Ok(reaped)
	}

	/// Applies one termination. Returns the index of the affected record.
	pub fn on_termination(&self, registry: &mut Registry, event: Reaped, now: Instant) -> Option<usize> {
		let Some(index) = registry.find_by_pid(event.pid) else {
			tracing::debug!("reaped untracked pid {} ({})", event.pid, event.termination);
			return None;
		};
		let record = registry.get_mut(index)?;
		let uptime = record
			.started_at()
			.map(|started| now.saturating_duration_since(started));

		record.set_exited(event.termination);
		tracing::info!(
			"{} (pid {}) ended with {} after {:.1}s",
			record.command(),
			event.pid,
			event.termination,
			uptime.unwrap_or_default().as_secs_f64()
		);

		self.schedule(record, uptime, now);
		Some(index)
	}

	fn schedule(&self, record: &mut Record, uptime: Option<Duration>, now: Instant) {
		match self.policy.verdict(record.rapid_failures(), uptime) {
			Verdict::Restart {
				after,
				rapid_failures,
			} => {
				record.set_rapid_failures(rapid_failures);
				record.set_state(ProcessState::RestartPending {
					due: deadline(now, after),
				});
				tracing::debug!("restarting {} in {:?}", record.command(), after);
			}
			Verdict::GiveUp { rapid_failures } => {
				record.set_rapid_failures(rapid_failures);
				record.set_state(ProcessState::Abandoned);
				tracing::warn!(
					"giving up on {} after {} rapid failures",
					record.command(),
					rapid_failures
				);
			}
		}
	}

	/// Earliest pending relaunch deadline.
	pub fn next_due(&self, registry: &Registry) -> Option<Instant> {
		registry
			.iter()
			.filter_map(|r| match r.state() {
				ProcessState::RestartPending { due } => Some(due),
				_ => None,
			})
			.min()
	}

	/// Relaunches every record whose deadline is at or before `now`, in
	/// registry order. Returns the number of launch attempts.
	pub fn restart_due<H: ProcessHost>(&self, host: &mut H, registry: &mut Registry, now: Instant) -> usize {
		let due: Vec<usize> = registry
			.iter()
			.filter(|r| matches!(r.state(), ProcessState::RestartPending { due } if due <= now))
			.map(Record::index)
			.collect();

		for &index in &due {
			self.launch(host, registry, index, now);
		}
		due.len()
	}
}

/// Upper bound for a deadline whose delay does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline(now: Instant, after: Duration) -> Instant {
	now.checked_add(after)
		.or_else(|| now.checked_add(FAR_FUTURE))
		.unwrap_or(now)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeHost;
	use crate::types::Termination;

	fn setup(n: usize) -> (Reaper, FakeHost, Registry) {
		let mut builder = Registry::builder();
		for i in 0..n {
			builder.add_command(format!("/bin/p{}", i)).unwrap();
		}
		let mut registry = builder.build();
		let mut host = FakeHost::new();
		let reaper = Reaper::new(RestartPolicy::fixed(Duration::from_secs(2)));
		let now = Instant::now();
		for i in 0..n {
			reaper.launch(&mut host, &mut registry, i, now).unwrap().unwrap();
		}
		(reaper, host, registry)
	}

	#[test]
	fn termination_schedules_after_delay() {
		let (reaper, mut host, mut registry) = setup(1);
		let old = registry.get(0).unwrap().pid().unwrap();
		let now = Instant::now();

		host.exit(old, 0);
		assert_eq!(reaper.drain(&mut host, &mut registry, now), Ok(1));
		assert_eq!(registry.find_by_pid(old), None);
		assert_eq!(reaper.next_due(&registry), Some(now + Duration::from_secs(2)));

		let early = now + Duration::from_millis(1999);
		assert_eq!(reaper.restart_due(&mut host, &mut registry, early), 0);
		assert_eq!(registry.get(0).unwrap().pid(), None);

		let due = now + Duration::from_secs(2);
		assert_eq!(reaper.restart_due(&mut host, &mut registry, due), 1);
		let new = registry.get(0).unwrap().pid().unwrap();
		assert_ne!(new, old);
		assert_eq!(registry.find_by_pid(new), Some(0));
		assert_eq!(registry.get(0).unwrap().restarts(), 1);
	}

	#[test]
	fn every_record_gets_a_fresh_pid() {
		let (reaper, mut host, mut registry) = setup(8);
		let before = registry.tracked_pids();
		let now = Instant::now();

		for pid in &before {
			host.exit(*pid, 1);
		}
		assert_eq!(reaper.drain(&mut host, &mut registry, now), Ok(8));
		assert!(registry.tracked_pids().is_empty());

		reaper.restart_due(&mut host, &mut registry, now + Duration::from_secs(2));
		for (record, old) in registry.iter().zip(&before) {
			let new = record.pid().unwrap();
			assert!(new.as_raw() > 0);
			assert_ne!(new, *old);
			assert_eq!(registry.find_by_pid(*old), None);
		}
	}

	#[test]
	fn untracked_pid_is_ignored() {
		let (reaper, mut host, mut registry) = setup(2);
		let pids = registry.tracked_pids();
		host.exit(Pid::from_raw(4_000_000), 0);

		assert_eq!(reaper.drain(&mut host, &mut registry, Instant::now()), Ok(1));
		assert_eq!(registry.tracked_pids(), pids);
		assert_eq!(reaper.next_due(&registry), None);
	}

	#[test]
	fn termination_is_kept_after_scheduling() {
		let (reaper, _host, mut registry) = setup(1);
		let pid = registry.get(0).unwrap().pid().unwrap();
		let event = Reaped {
			pid,
			termination: Termination::Exited(3),
		};
		assert_eq!(reaper.on_termination(&mut registry, event, Instant::now()), Some(0));

		let status = registry.get(0).unwrap().status();
		assert!(matches!(status.state, ProcessState::RestartPending { .. }));
		assert_eq!(status.last_termination, Some(Termination::Exited(3)));
	}

	#[test]
	fn oversized_delay_does_not_overflow() {
		let mut builder = Registry::builder();
		builder.add_command("/bin/p0").unwrap();
		let mut registry = builder.build();
		let mut host = FakeHost::new();
		let reaper = Reaper::new(RestartPolicy::fixed(Duration::from_secs(u64::MAX)));
		let now = Instant::now();
		let pid = reaper.launch(&mut host, &mut registry, 0, now).unwrap().unwrap();

		host.exit(pid, 0);
		assert_eq!(reaper.drain(&mut host, &mut registry, now), Ok(1));
		let due = reaper.next_due(&registry).unwrap();
		assert!(due > now);
		assert_eq!(reaper.restart_due(&mut host, &mut registry, now + Duration::from_secs(3600)), 0);
	}

	#[test]
	fn failed_launch_is_rescheduled() {
		let (reaper, mut host, mut registry) = setup(1);
		let pid = registry.get(0).unwrap().pid().unwrap();
		let now = Instant::now();
		host.exit(pid, 0);
		reaper.drain(&mut host, &mut registry, now).unwrap();

		host.fail_next_launches(1);
		let first_due = now + Duration::from_secs(2);
		assert_eq!(reaper.restart_due(&mut host, &mut registry, first_due), 1);
		assert_eq!(registry.get(0).unwrap().pid(), None);
		assert_eq!(
			reaper.next_due(&registry),
			Some(first_due + Duration::from_secs(2))
		);

		reaper.restart_due(&mut host, &mut registry, first_due + Duration::from_secs(2));
		assert!(registry.get(0).unwrap().state().is_running());
	}

	#[test]
	fn due_restarts_launch_in_registry_order() {
		let (reaper, mut host, mut registry) = setup(3);
		let pids = registry.tracked_pids();
		let now = Instant::now();
		host.exit(pids[2], 0);
		host.exit(pids[0], 0);
		reaper.drain(&mut host, &mut registry, now).unwrap();

		let launched_before = host.launches().len();
		reaper.restart_due(&mut host, &mut registry, now + Duration::from_secs(5));
		let order: Vec<usize> = host.launches()[launched_before..]
			.iter()
			.map(|l| l.index)
			.collect();
		assert_eq!(order, vec![0, 2]);
	}
}
