//! Restart timing.
//!
//! Every relaunch waits at least [`RestartPolicy::delay`]. A process that dies
//! before [`RestartPolicy::min_uptime`], or that could not be launched at all,
//! counts as a *rapid failure*; consecutive rapid failures grow the delay by
//! [`RestartPolicy::backoff_factor`] up to [`RestartPolicy::max_delay`]. With
//! [`RestartPolicy::max_rapid_restarts`] set, a record that keeps failing past
//! the threshold is abandoned instead of relaunched.
//!
//! ```rust
//! use std::time::Duration;
//! use watchdog::RestartPolicy;
//!
//! let policy = RestartPolicy::default();
//! assert_eq!(policy.delay_for(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(4));
//! assert_eq!(policy.delay_for(30), Duration::from_secs(60));
//! ```

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
	/// Base wait before a relaunch.
	pub delay: Duration,
	/// Growth per consecutive rapid failure. `1.0` disables backoff.
	pub backoff_factor: f64,
	/// Cap on the grown delay. Never lowers the delay below `delay`.
	pub max_delay: Duration,
	/// Processes living at least this long reset the rapid-failure counter.
	pub min_uptime: Duration,
	/// Abandon a record after this many consecutive rapid failures.
	pub max_rapid_restarts: Option<u32>,
}

impl Default for RestartPolicy {
	fn default() -> Self {
		Self {
			delay: Duration::from_secs(2),
			backoff_factor: 2.0,
			max_delay: Duration::from_secs(60),
			min_uptime: Duration::from_secs(5),
			max_rapid_restarts: None,
		}
	}
}

/// What to do with a record that just stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Restart { after: Duration, rapid_failures: u32 },
	GiveUp { rapid_failures: u32 },
}

impl RestartPolicy {
	/// Restart policy with a fixed delay and no backoff.
	pub fn fixed(delay: Duration) -> Self {
		Self {
			delay,
			backoff_factor: 1.0,
			max_delay: delay,
			..Self::default()
		}
	}

	/// Delay before the relaunch following `rapid_failures` consecutive rapid
	/// failures. Zero and one both yield the base delay.
	pub fn delay_for(&self, rapid_failures: u32) -> Duration {
		let exponent = rapid_failures.saturating_sub(1).min(64) as i32;
		let factor = self.backoff_factor.max(1.0).powi(exponent);
		let cap = self.max_delay.max(self.delay);
		let grown = self.delay.as_secs_f64() * factor;
		if !grown.is_finite() || grown >= cap.as_secs_f64() {
			cap
		} else {
			Duration::from_secs_f64(grown).max(self.delay)
		}
	}

	/// Decides the next step for a record.
	///
	/// `uptime` is how long the process ran, or `None` when it never started.
	pub fn verdict(&self, previous_rapid: u32, uptime: Option<Duration>) -> Verdict {
		let rapid = match uptime {
			Some(up) if up >= self.min_uptime => 0,
			_ => previous_rapid.saturating_add(1),
		};

		if let Some(limit) = self.max_rapid_restarts {
			if rapid > limit {
				return Verdict::GiveUp {
					rapid_failures: rapid,
				};
			}
		}

		Verdict::Restart {
			after: self.delay_for(rapid),
			rapid_failures: rapid,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_failure_uses_base_delay() {
		let policy = RestartPolicy::default();
		assert_eq!(policy.delay_for(0), Duration::from_secs(2));
		assert_eq!(policy.delay_for(1), Duration::from_secs(2));
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let policy = RestartPolicy::default();
		assert_eq!(policy.delay_for(3), Duration::from_secs(8));
		assert_eq!(policy.delay_for(6), Duration::from_secs(60));
		assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
	}

	#[test]
	fn cap_below_base_keeps_base() {
		let policy = RestartPolicy {
			delay: Duration::from_secs(10),
			max_delay: Duration::from_secs(1),
			..RestartPolicy::default()
		};
		assert_eq!(policy.delay_for(5), Duration::from_secs(10));
	}

	#[test]
	fn fixed_policy_never_grows() {
		let policy = RestartPolicy::fixed(Duration::from_millis(250));
		for n in 0..20 {
			assert_eq!(policy.delay_for(n), Duration::from_millis(250));
		}
	}

	#[test]
	fn long_uptime_resets_counter() {
		let policy = RestartPolicy::default();
		let v = policy.verdict(4, Some(Duration::from_secs(30)));
		assert_eq!(
			v,
			Verdict::Restart {
				after: Duration::from_secs(2),
				rapid_failures: 0
			}
		);
	}

	#[test]
	fn short_uptime_and_launch_failure_are_rapid() {
		let policy = RestartPolicy::default();
		assert_eq!(
			policy.verdict(1, Some(Duration::from_millis(10))),
			Verdict::Restart {
				after: Duration::from_secs(4),
				rapid_failures: 2
			}
		);
		assert_eq!(
			policy.verdict(0, None),
			Verdict::Restart {
				after: Duration::from_secs(2),
				rapid_failures: 1
			}
		);
	}

	#[test]
	fn crash_loop_threshold_gives_up() {
		let policy = RestartPolicy {
			max_rapid_restarts: Some(2),
			..RestartPolicy::default()
		};
		assert!(matches!(policy.verdict(1, None), Verdict::Restart { .. }));
		assert_eq!(
			policy.verdict(2, None),
			Verdict::GiveUp { rapid_failures: 3 }
		);
	}
}
