//! Session orchestration: the per-request interceptor, the refresh coordinator it drives, and
//! the login/logout/status facade.

pub mod coordinator;
pub mod interceptor;
pub mod manager;

mod metrics;

pub use coordinator::*;
pub use interceptor::*;
pub use manager::*;
pub use metrics::RefreshMetrics;

// self
use crate::{_prelude::*, http::RefreshClient, store::TokenStore};

/// Notification that the session ended and the user must sign in again.
///
/// Implementations run synchronously and must not panic; UI layers typically use it to redirect
/// to the login screen.
pub trait LogoutHook
where
	Self: Send + Sync,
{
	/// Signals that the session ended.
	fn notify_logout(&self);
}
impl<F> LogoutHook for F
where
	F: Fn() + Send + Sync,
{
	fn notify_logout(&self) {
		self()
	}
}

/// Collaborators shared by the interceptor and the refresh it may start.
#[derive(Clone)]
pub struct Collaborators {
	/// Token storage.
	pub store: Arc<dyn TokenStore>,
	/// Refresh exchange.
	pub client: Arc<dyn RefreshClient>,
	/// Logout notification.
	pub logout: Arc<dyn LogoutHook>,
}
impl Collaborators {
	/// Groups the three collaborators.
	pub fn new(
		store: Arc<dyn TokenStore>,
		client: Arc<dyn RefreshClient>,
		logout: Arc<dyn LogoutHook>,
	) -> Self {
		Self { store, client, logout }
	}

	/// Clears storage and signals logout; a failed clear is logged, never surfaced.
	pub(crate) async fn end_session(&self) {
		if let Err(e) = self.store.clear().await {
			tracing::warn!(error = %e, "Failed to clear stored tokens while ending the session.");
		}

		self.logout.notify_logout();
	}
}
impl Debug for Collaborators {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Collaborators(..)")
	}
}
