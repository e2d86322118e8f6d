//! Session lifecycle notifications for the hosting application.
//!
//! The client never navigates or touches UI state itself. When a session ends it emits a
//! [`SessionEvent`] and the host reacts: a web shell performs a full navigation to the login
//! route, a desktop app swaps windows, a CLI prints a hint and exits.

// self
use crate::_prelude::*;

/// Session lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// The session could not be recovered; tokens were cleared and the host should send the
	/// user to `redirect_to`, discarding any in-memory state.
	Expired {
		/// Configured login route.
		redirect_to: String,
	},
	/// The user logged out; tokens and session-scoped storage were cleared. Hosts holding
	/// cookies should expire them now.
	LoggedOut,
	/// A refresh succeeded and a new access token was stored.
	Refreshed,
}

/// Receives [`SessionEvent`]s. Implementations must return quickly and never block.
pub trait SessionListener
where
	Self: Send + Sync,
{
	/// Handles one event.
	fn on_event(&self, event: &SessionEvent);
}

/// Listener that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;
impl SessionListener for NoopListener {
	fn on_event(&self, _: &SessionEvent) {}
}

/// Listener that keeps every event it receives, useful for hosts that poll and for tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingListener(Arc<Mutex<Vec<SessionEvent>>>);
impl RecordingListener {
	/// Returns a copy of the events observed so far.
	pub fn events(&self) -> Vec<SessionEvent> {
		self.0.lock().clone()
	}

	/// Removes and returns the events observed so far.
	pub fn drain(&self) -> Vec<SessionEvent> {
		std::mem::take(&mut *self.0.lock())
	}
}
impl SessionListener for RecordingListener {
	fn on_event(&self, event: &SessionEvent) {
		self.0.lock().push(event.clone());
	}
}
impl<F> SessionListener for F
where
	F: Fn(&SessionEvent) + Send + Sync,
{
	fn on_event(&self, event: &SessionEvent) {
		self(event)
	}
}
