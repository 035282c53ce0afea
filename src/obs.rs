//! Observability helpers for session stages.
//!
//! - Every stage runs inside a `tracing` span named `receiptr_session.stage` carrying the
//!   `stage` and `call_site` fields. Tokens never appear in span fields or events.
//! - Enable the `metrics` feature to increment `receiptr_session_stage_total` (labeled by
//!   `stage` + `outcome`) and `receiptr_session_intercept_total` (labeled by `outcome`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionStage {
	/// Authorizing an outgoing request.
	Intercept,
	/// Exchanging the refresh token for a new bundle.
	Refresh,
	/// Exchanging user credentials for a new bundle.
	Login,
	/// Registering a new account.
	SignUp,
	/// Ending the session locally.
	Logout,
}
impl SessionStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionStage::Intercept => "intercept",
			SessionStage::Refresh => "refresh",
			SessionStage::Login => "login",
			SessionStage::SignUp => "sign_up",
			SessionStage::Logout => "logout",
		}
	}
}
impl Display for SessionStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
