use std::path::{Path, PathBuf};

/// Detaches from the controlling terminal. Keeps the working directory and
/// the standard streams so relative command paths and logging still work.
///
/// Must run before the tokio runtime is built: the process forks.
#[cfg(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "dragonfly",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "illumos",
	target_os = "solaris"
))]
pub fn detach() -> Result<(), String> {
	nix::unistd::daemon(true, true).map_err(|e| format!("failed to detach: {}", e))
}

/// `daemon(3)` is not available here; run under launchd or a shell `&` instead.
#[cfg(not(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "dragonfly",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "illumos",
	target_os = "solaris"
)))]
pub fn detach() -> Result<(), String> {
	Err(format!("detaching (-d) is not supported on {}", std::env::consts::OS))
}

/// Pid file removed again when dropped.
#[derive(Debug)]
pub struct PidFile {
	path: PathBuf,
}

impl PidFile {
	pub fn create(path: &Path) -> Result<Self, String> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent)
				.map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
		}
		std::fs::write(path, format!("{}\n", std::process::id()))
			.map_err(|e| format!("failed to write pid file {}: {}", path.display(), e))?;
		tracing::debug!("wrote pid file {}", path.display());
		Ok(Self { path: path.to_path_buf() })
	}
}

impl Drop for PidFile {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(&self.path);
	}
}
