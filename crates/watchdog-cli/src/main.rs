mod args;
mod config;
mod daemon;

use args::Action;
use tracing_subscriber::EnvFilter;
use watchdog::{EXIT_CONFIG, EXIT_OK, EXIT_SYSTEM};

fn main() {
	let argv: Vec<String> = std::env::args().skip(1).collect();
	std::process::exit(run(&argv));
}

fn run(argv: &[String]) -> i32 {
	let cli = match args::parse(argv) {
		Ok(Action::Run(cli)) => cli,
		Ok(Action::Help) => {
			args::print_usage();
			return EXIT_OK;
		}
		Ok(Action::Version) => {
			println!("watchdog {}", env!("CARGO_PKG_VERSION"));
			return EXIT_OK;
		}
		Err(e) => {
			eprintln!("error: {}", e);
			eprintln!("run 'watchdog --help' for usage");
			return EXIT_CONFIG;
		}
	};

	init_tracing();

	let settings = match config::resolve(cli) {
		Ok(s) => s,
		Err(e) => {
			tracing::error!("{}", e);
			return EXIT_CONFIG;
		}
	};

	if settings.detach {
		if let Err(e) = daemon::detach() {
			tracing::error!("{}", e);
			return EXIT_SYSTEM;
		}
	}

	let _pid_file = match settings.pid_file.as_deref().map(daemon::PidFile::create).transpose() {
		Ok(p) => p,
		Err(e) => {
			tracing::error!("{}", e);
			return EXIT_SYSTEM;
		}
	};

	let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
		Ok(rt) => rt,
		Err(e) => {
			tracing::error!("failed to start runtime: {}", e);
			return EXIT_SYSTEM;
		}
	};

	tracing::info!(
		"watchdog started (pid {}, {} commands, restart delay {}s)",
		std::process::id(),
		settings.registry.len(),
		settings.policy.delay.as_secs()
	);

	match runtime.block_on(watchdog::supervise(settings.registry, settings.policy)) {
		Ok(exit) => {
			tracing::info!("{}", exit);
			exit.code()
		}
		Err(e) => {
			tracing::error!("{}", e);
			e.code()
		}
	}
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
