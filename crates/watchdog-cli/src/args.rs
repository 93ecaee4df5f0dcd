use std::path::PathBuf;

use owo_colors::OwoColorize;

use crate::config::Directive;

#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
	pub directives: Vec<Directive>,
	pub restart_delay: Option<u64>,
	pub detach: bool,
	pub config: Option<PathBuf>,
	pub pid_file: Option<PathBuf>,
	pub max_delay: Option<u64>,
	pub min_uptime: Option<u64>,
	pub max_rapid: Option<u32>,
	pub capacity: Option<usize>,
}

#[derive(Debug, PartialEq)]
pub enum Action {
	Run(CliArgs),
	Help,
	Version,
}

pub fn parse(args: &[String]) -> Result<Action, String> {
	let mut cli = CliArgs::default();
	let mut iter = args.iter();

	while let Some(arg) = iter.next() {
		let (flag, inline) = split_short(arg);
		let mut value = |name: &str| -> Result<String, String> {
			match inline {
				Some(v) => Ok(v.to_string()),
				None => iter
					.next()
					.cloned()
					.ok_or_else(|| format!("{} requires a value", name)),
			}
		};

		match flag {
			"-h" | "--help" => {
				no_value(flag, inline)?;
				return Ok(Action::Help);
			}
			"-V" | "--version" => {
				no_value(flag, inline)?;
				return Ok(Action::Version);
			}
			"-a" => cli.directives.push(Directive::AddCommand(value("-a")?)),
			"-e" => cli.directives.push(Directive::AppendArgument(value("-e")?)),
			"-s" => cli.restart_delay = Some(number("-s", &value("-s")?)?),
			"-d" => {
				no_value(flag, inline)?;
				cli.detach = true;
			}
			"-c" | "--config" => cli.config = Some(PathBuf::from(value(flag)?)),
			"--pid-file" => cli.pid_file = Some(PathBuf::from(value(flag)?)),
			"--max-delay" => cli.max_delay = Some(number(flag, &value(flag)?)?),
			"--min-uptime" => cli.min_uptime = Some(number(flag, &value(flag)?)?),
			"--max-rapid" => cli.max_rapid = Some(number(flag, &value(flag)?)?),
			"--capacity" => cli.capacity = Some(number(flag, &value(flag)?)?),
			other => return Err(format!("unknown option: {}", other)),
		}
	}

	Ok(Action::Run(cli))
}

/// `-aVALUE` becomes (`-a`, `Some("VALUE")`). Long options are never split.
fn split_short(arg: &str) -> (&str, Option<&str>) {
	if arg.len() > 2 && arg.starts_with('-') && !arg.starts_with("--") && arg.is_char_boundary(2) {
		let (flag, rest) = arg.split_at(2);
		return (flag, Some(rest));
	}
	(arg, None)
}

fn no_value(flag: &str, inline: Option<&str>) -> Result<(), String> {
	match inline {
		Some(v) => Err(format!("unexpected value '{}' for {}", v, flag)),
		None => Ok(()),
	}
}

fn number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, String> {
	raw.parse()
		.map_err(|_| format!("{} expects a non-negative number, got '{}'", flag, raw))
}

pub fn print_usage() {
	eprintln!("{} {}: keep commands running", "watchdog".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} [options] -a <path> [-e <arg>]... [-a <path> ...]", "watchdog".bold());
	eprintln!();

	eprintln!("{}", "commands".cyan().bold());
	eprintln!("  {} <path>              Supervise the executable at <path>", "-a".bold());
	eprintln!("  {} <arg>               Append an argument to the last -a command", "-e".bold());
	eprintln!("  {} <file>      Read commands and settings from a TOML file", "-c, --config".bold());
	eprintln!();

	eprintln!("{}", "restart policy".cyan().bold());
	eprintln!("  {} <secs>              Restart delay (default 2)", "-s".bold());
	eprintln!("  {} <secs>     Backoff cap for rapid failures (default 60)", "--max-delay".bold());
	eprintln!("  {} <secs>    Shorter runs count as rapid failures (default 5)", "--min-uptime".bold());
	eprintln!("  {} <n>         Give up after n rapid failures in a row", "--max-rapid".bold());
	eprintln!("  {} <n>          Maximum number of commands (default 128)", "--capacity".bold());
	eprintln!();

	eprintln!("{}", "process".cyan().bold());
	eprintln!("  {}                     Detach from the terminal", "-d".bold());
	eprintln!("  {} <file>       Write the supervisor pid to <file>", "--pid-file".bold());
	eprintln!("  {}             Show this help", "-h, --help".bold());
	eprintln!("  {}          Show version", "-V, --version".bold());
	eprintln!();

	eprintln!("{}", "example".cyan().bold());
	eprintln!("  watchdog -a /bin/sleep -e 500 -a /usr/bin/top");
	eprintln!();
	eprintln!("SIGINT or SIGTERM kills every supervised process and exits.");
}
