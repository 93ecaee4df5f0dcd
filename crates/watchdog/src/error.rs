use nix::errno::Errno;

/// Errors raised while building the registry. The supervisor never starts
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
	/// The registry already holds `capacity` commands.
	CapacityExceeded { capacity: usize },
	/// An argument was appended before any command was added.
	NoActiveRecord,
	/// The string contains a NUL byte and can never reach `execv`.
	InvalidString(String),
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::CapacityExceeded { capacity } => {
				write!(f, "too many commands (capacity is {})", capacity)
			}
			ConfigError::NoActiveRecord => write!(f, "argument given before any command"),
			ConfigError::InvalidString(s) => write!(f, "string contains a NUL byte: {:?}", s),
		}
	}
}

impl std::error::Error for ConfigError {}

/// Errors from creating a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
	/// `fork` failed; no child exists.
	ForkFailed(Errno),
	/// The command or an argument could not be converted to a C string.
	InvalidString(String),
}

impl std::fmt::Display for LaunchError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LaunchError::ForkFailed(e) => write!(f, "fork failed: {}", e),
			LaunchError::InvalidString(s) => write!(f, "string contains a NUL byte: {:?}", s),
		}
	}
}

impl std::error::Error for LaunchError {}

/// `waitpid` failed for a reason other than "no children".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitError(pub Errno);

impl std::fmt::Display for WaitError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "waitpid failed: {}", self.0)
	}
}

impl std::error::Error for WaitError {}

/// Fatal supervisor failures. After a wait failure the tracked children
/// have already been killed.
#[derive(Debug)]
pub enum SupervisorError {
	Wait(WaitError),
	/// The signal listeners could not be installed.
	Signals(std::io::Error),
}

impl std::fmt::Display for SupervisorError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SupervisorError::Wait(e) => write!(f, "{}", e),
			SupervisorError::Signals(e) => write!(f, "failed to install signal handlers: {}", e),
		}
	}
}

impl std::error::Error for SupervisorError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			SupervisorError::Wait(e) => Some(e),
			SupervisorError::Signals(e) => Some(e),
		}
	}
}

impl From<WaitError> for SupervisorError {
	fn from(e: WaitError) -> Self {
		SupervisorError::Wait(e)
	}
}
