//! Singleflight refresh coordination.
//!
//! A [`RefreshCoordinator`] owns at most one in-flight refresh. The first caller that needs a
//! refresh installs a shared future in the coordinator's slot; every caller that arrives while
//! it is pending awaits a clone of the same future and receives the same outcome. The slot is
//! emptied by a drop guard inside the refresh itself, so panics release it as well.
//!
//! The slot also remembers which refresh token the last settled refresh consumed. A caller that
//! read its bundle before that refresh saved a new one presents the consumed token again; it gets
//! the recorded outcome instead of a second exchange.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{TokenBundle, TokenSecret},
	obs::{self, SessionSpan, SessionStage, StageOutcome},
	session::{Collaborators, RefreshMetrics},
};

type SharedRefresh = Shared<BoxFuture<'static, Result<()>>>;
type Slot = Arc<Mutex<SlotState>>;

#[derive(Default)]
struct SlotState {
	in_flight: Option<InFlight>,
	settled: Option<Settled>,
}

struct InFlight {
	id: u64,
	refresh: SharedRefresh,
}

struct Settled {
	refresh_token: TokenSecret,
	outcome: Result<()>,
}

/// Guarantees at most one concurrent refresh exchange and fans its outcome out to every waiter.
///
/// Coordinators are plain values: construct one per HTTP-client layer (or per test) and share it
/// through `Arc` among the interceptors that should coalesce their refreshes.
#[derive(Default)]
pub struct RefreshCoordinator {
	slot: Slot,
	next_id: AtomicU64,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a refresh is pending.
	pub fn is_refreshing(&self) -> bool {
		self.slot.lock().in_flight.is_some()
	}

	/// Awaits the pending refresh, if any, and returns its outcome.
	///
	/// Returns `Ok(())` immediately when nothing is in flight.
	pub async fn wait_in_flight(&self) -> Result<()> {
		let pending =
			self.slot.lock().in_flight.as_ref().map(|in_flight| in_flight.refresh.clone());

		match pending {
			Some(refresh) => {
				tracing::debug!("Waiting for the in-flight token refresh.");

				refresh.await
			},
			None => Ok(()),
		}
	}

	/// Refreshes `bundle`, or joins the refresh that is already in flight.
	///
	/// On success the new bundle has been persisted before this returns. On failure storage has
	/// been cleared and logout signalled exactly once, no matter how many callers joined; every
	/// caller receives the same error. A bundle whose refresh token was already consumed by the
	/// last settled refresh is answered with that refresh's outcome without contacting the
	/// backend.
	pub async fn refresh(&self, bundle: &TokenBundle, collaborators: &Collaborators) -> Result<()> {
		let refresh = {
			let mut slot = self.slot.lock();

			if let Some(in_flight) = &slot.in_flight {
				self.metrics.record_join();

				in_flight.refresh.clone()
			} else if let Some(settled) =
				slot.settled.as_ref().filter(|settled| settled.refresh_token == bundle.refresh_token)
			{
				self.metrics.record_join();
				tracing::debug!("Refresh token already exchanged; reusing the settled outcome.");

				return settled.outcome.clone();
			} else {
				let id = self.next_id.fetch_add(1, Ordering::Relaxed);
				let refresh = Self::run(
					SlotReset { slot: self.slot.clone(), id },
					bundle.refresh_token.clone(),
					collaborators.clone(),
					self.metrics.clone(),
				)
				.boxed()
				.shared();

				slot.in_flight = Some(InFlight { id, refresh: refresh.clone() });

				refresh
			}
		};

		refresh.await
	}

	async fn run(
		reset: SlotReset,
		refresh_token: TokenSecret,
		collaborators: Collaborators,
		metrics: Arc<RefreshMetrics>,
	) -> Result<()> {
		let span = SessionSpan::new(SessionStage::Refresh, "refresh_session");

		metrics.record_attempt();
		obs::record_stage_outcome(SessionStage::Refresh, StageOutcome::Attempt);

		let outcome = span
			.instrument(async {
				let bundle = collaborators.client.refresh_session(&refresh_token).await?;

				collaborators.store.save(bundle).await?;

				Ok::<_, Error>(())
			})
			.await;
		let outcome = match outcome {
			Ok(()) => {
				metrics.record_success();
				obs::record_stage_outcome(SessionStage::Refresh, StageOutcome::Success);
				tracing::debug!("Session token refreshed.");

				Ok(())
			},
			Err(e) => {
				metrics.record_failure();
				obs::record_stage_outcome(SessionStage::Refresh, StageOutcome::Failure);
				tracing::warn!(error = %e, "Token refresh failed; ending the session.");

				collaborators.end_session().await;

				Err(e)
			},
		};

		reset.settle(refresh_token, outcome.clone());

		outcome
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &self.is_refreshing())
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Empties the coordinator slot when the refresh that owns it settles or unwinds.
struct SlotReset {
	slot: Slot,
	id: u64,
}
impl SlotReset {
	/// Records the consumed refresh token with its outcome and releases the slot in one step.
	fn settle(self, refresh_token: TokenSecret, outcome: Result<()>) {
		let mut slot = self.slot.lock();

		slot.settled = Some(Settled { refresh_token, outcome });

		if slot.in_flight.as_ref().is_some_and(|in_flight| in_flight.id == self.id) {
			slot.in_flight = None;
		}
	}
}
impl Drop for SlotReset {
	fn drop(&mut self) {
		let mut slot = self.slot.lock();

		if slot.in_flight.as_ref().is_some_and(|in_flight| in_flight.id == self.id) {
			slot.in_flight = None;
		}
	}
}
