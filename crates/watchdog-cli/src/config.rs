use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use watchdog::{ConfigError, Registry, RegistryBuilder, RestartPolicy, DEFAULT_CAPACITY};

use crate::args::CliArgs;

/// One configuration step, applied to the registry in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
	/// Start a new record. The path doubles as `argv[0]`.
	AddCommand(String),
	/// Extend the argument vector of the most recent record.
	AppendArgument(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
	pub restart_delay: Option<u64>,
	#[serde(default)]
	pub detach: bool,
	pub pid_file: Option<PathBuf>,
	pub capacity: Option<usize>,
	#[serde(default)]
	pub policy: PolicyConfig,
	#[serde(default, rename = "process")]
	pub processes: Vec<ProcessConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
	#[serde(default = "default_backoff_factor")]
	pub backoff_factor: f64,
	#[serde(default = "default_max_delay")]
	pub max_delay: u64,
	#[serde(default = "default_min_uptime")]
	pub min_uptime: u64,
	pub max_rapid_restarts: Option<u32>,
}

impl Default for PolicyConfig {
	fn default() -> Self {
		Self {
			backoff_factor: default_backoff_factor(),
			max_delay: default_max_delay(),
			min_uptime: default_min_uptime(),
			max_rapid_restarts: None,
		}
	}
}

fn default_restart_delay() -> u64 {
	2
}
fn default_backoff_factor() -> f64 {
	2.0
}
fn default_max_delay() -> u64 {
	60
}
fn default_min_uptime() -> u64 {
	5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
	pub command: String,
	#[serde(default)]
	pub args: Vec<String>,
}

/// Everything `main` needs to start supervising.
#[derive(Debug)]
pub struct Settings {
	pub registry: Registry,
	pub policy: RestartPolicy,
	pub detach: bool,
	pub pid_file: Option<PathBuf>,
}

pub fn load_file(path: &Path) -> Result<FileConfig, String> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
	parse_file(&content).map_err(|e| format!("invalid config {}: {}", path.display(), e))
}

pub fn parse_file(content: &str) -> Result<FileConfig, toml::de::Error> {
	toml::from_str(content)
}

/// Merges the optional config file with the command line. File processes
/// come first; scalar flags given on the command line win.
pub fn resolve(cli: CliArgs) -> Result<Settings, String> {
	let file = match &cli.config {
		Some(path) => load_file(path)?,
		None => FileConfig::default(),
	};

	let mut directives = Vec::new();
	for process in &file.processes {
		directives.push(Directive::AddCommand(process.command.clone()));
		directives.extend(process.args.iter().cloned().map(Directive::AppendArgument));
	}
	directives.extend(cli.directives);

	let capacity = cli.capacity.or(file.capacity).unwrap_or(DEFAULT_CAPACITY);
	let registry = build_registry(capacity, &directives).map_err(|e| e.to_string())?;

	let backoff_factor = file.policy.backoff_factor;
	if !backoff_factor.is_finite() || backoff_factor < 1.0 {
		return Err(format!("backoff_factor must be at least 1.0, got {}", backoff_factor));
	}

	let delay = bounded(
		"restart_delay",
		cli.restart_delay.or(file.restart_delay).unwrap_or_else(default_restart_delay),
	)?;
	let max_delay = bounded("max_delay", cli.max_delay.unwrap_or(file.policy.max_delay))?;
	let min_uptime = bounded("min_uptime", cli.min_uptime.unwrap_or(file.policy.min_uptime))?;

	let policy = RestartPolicy {
		delay,
		backoff_factor,
		max_delay,
		min_uptime,
		max_rapid_restarts: cli.max_rapid.or(file.policy.max_rapid_restarts),
	};

	Ok(Settings {
		registry,
		policy,
		detach: cli.detach || file.detach,
		pid_file: cli.pid_file.or(file.pid_file),
	})
}

pub fn build_registry(capacity: usize, directives: &[Directive]) -> Result<Registry, ConfigError> {
	let mut builder = RegistryBuilder::with_capacity(capacity);
	for directive in directives {
		match directive {
			Directive::AddCommand(path) => {
				builder.add_command(path.as_str())?;
				builder.append_argument(path.as_str())?;
			}
			Directive::AppendArgument(arg) => builder.append_argument(arg.as_str())?,
		}
	}
	Ok(builder.build())
}

/// Longest accepted delay or uptime, one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

fn bounded(name: &str, secs: u64) -> Result<Duration, String> {
	if secs > MAX_DURATION_SECS {
		return Err(format!(
			"{} of {}s exceeds the maximum of {}s",
			name, secs, MAX_DURATION_SECS
		));
	}
	Ok(Duration::from_secs(secs))
}
