//! OS signal relay.
//!
//! Signal delivery is recorded by tokio's signal driver; the relay task only
//! forwards a [`Notice`] per wake-up. Several SIGCHLDs may collapse into one
//! notice, which is why the supervisor drains every pending termination
//! whenever it sees [`Notice::ChildExited`].

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
	/// At least one child terminated.
	ChildExited,
	/// Stop everything and exit.
	Shutdown,
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn channel() -> (NoticeSender, NoticeReceiver) {
	mpsc::unbounded_channel()
}

/// Installs SIGCHLD, SIGINT and SIGTERM listeners and forwards them to `tx`.
///
/// Listeners are registered before this returns, so children launched
/// afterwards cannot exit unnoticed. Must be called inside a tokio runtime.
pub fn relay(tx: NoticeSender) -> std::io::Result<JoinHandle<()>> {
	let mut child = signal(SignalKind::child())?;
	let mut interrupt = signal(SignalKind::interrupt())?;
	let mut terminate = signal(SignalKind::terminate())?;

	Ok(tokio::spawn(async move {
		loop {
			let notice = tokio::select! {
				Some(()) = child.recv() => Notice::ChildExited,
				Some(()) = interrupt.recv() => {
					tracing::info!("received SIGINT");
					Notice::Shutdown
				}
				Some(()) = terminate.recv() => {
					tracing::info!("received SIGTERM");
					Notice::Shutdown
				}
				else => break,
			};
			if tx.send(notice).is_err() {
				break;
			}
		}
	}))
}
