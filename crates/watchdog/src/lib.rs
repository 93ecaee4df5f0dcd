//! # watchdog
//!
//! Keeps a fixed set of commands running forever.
//!
//! Every configured command is forked and exec'd once at start. When a child
//! terminates it is reaped, and after the restart delay the same command is
//! launched again with the same arguments. SIGINT or SIGTERM kills every
//! tracked child and ends supervision.
//!
//! ```text
//!  RegistryBuilder ──build()──► Registry ──► Supervisor::run()
//!                                              │
//!     SIGCHLD/SIGINT/SIGTERM ─► signals::relay ─► Notice channel
//!                                              │
//!        ChildExited ─► Reaper::drain ─► RestartPending{due}
//!        due passed  ─► Reaper::restart_due ─► ProcessHost::launch
//!        Shutdown    ─► shutdown::disarm + kill_all ─► Exit::Shutdown
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use watchdog::{Registry, RestartPolicy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut builder = Registry::builder();
//! builder.add_command("/bin/sleep").unwrap();
//! builder.append_argument("sleep").unwrap();
//! builder.append_argument("30").unwrap();
//!
//! let exit = watchdog::supervise(builder.build(), RestartPolicy::default())
//! 	.await
//! 	.unwrap();
//! std::process::exit(exit.code());
//! # }
//! ```

pub mod error;
pub mod launcher;
pub mod policy;
pub mod reaper;
pub mod registry;
pub mod shutdown;
pub mod signals;
pub mod supervisor;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{ConfigError, LaunchError, SupervisorError, WaitError};
pub use launcher::{ProcessHost, UnixHost, EXEC_FAILURE_STATUS};
pub use policy::RestartPolicy;
pub use registry::{Record, Registry, RegistryBuilder, DEFAULT_CAPACITY};
pub use shutdown::ShutdownReport;
pub use signals::Notice;
pub use supervisor::{
	supervise, Exit, Supervisor, EXIT_CONFIG, EXIT_NO_PROCESSES, EXIT_OK, EXIT_SYSTEM,
};
pub use types::*;
