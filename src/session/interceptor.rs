//! Per-request bearer token injection.
//!
//! [`SessionInterceptor::intercept`] evaluates one outgoing request at a time:
//!
//! 1. Requests to auth endpoints pass through untouched, without touching storage.
//! 2. A pending refresh is awaited so the request observes the post-refresh bundle.
//! 3. The stored bundle decides the rest: no bundle sends the request anonymously, a usable
//!    session token is attached, an expired refresh token ends the session with
//!    [`Error::SessionExpired`], and anything else refreshes through the shared
//!    [`RefreshCoordinator`] before attaching the new session token.

// crates.io
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::{ExpiryPolicy, TokenBundle},
	config::ClientConfig,
	http::RefreshClient,
	obs::{self, SessionSpan, SessionStage, StageOutcome},
	session::{Collaborators, LogoutHook, RefreshCoordinator},
	store::TokenStore,
};

/// Outgoing request shape the interceptor can authorize.
pub trait InterceptedRequest
where
	Self: Send,
{
	/// Path component used to match auth-exempt endpoints.
	fn target_path(&self) -> &str;

	/// Mutable header map receiving the `Authorization` header.
	fn headers_mut(&mut self) -> &mut HeaderMap;
}
impl InterceptedRequest for reqwest::Request {
	fn target_path(&self) -> &str {
		self.url().path()
	}

	fn headers_mut(&mut self) -> &mut HeaderMap {
		reqwest::Request::headers_mut(self)
	}
}

/// State an interception ended in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterceptOutcome {
	/// Auth endpoint; request passed through unchanged.
	Bypass,
	/// No usable bundle; request sent without credentials.
	NoToken,
	/// Stored session token attached as-is.
	Valid,
	/// Session token refreshed, then attached.
	Refreshed,
	/// Refresh token expired; the session was ended.
	SessionExpired,
}
impl InterceptOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			InterceptOutcome::Bypass => "bypass",
			InterceptOutcome::NoToken => "no_token",
			InterceptOutcome::Valid => "valid",
			InterceptOutcome::Refreshed => "refreshed",
			InterceptOutcome::SessionExpired => "session_expired",
		}
	}
}
impl Display for InterceptOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Case-sensitive path fragments that mark auth endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthExemptions(Vec<String>);
impl AuthExemptions {
	/// Fragments matched when none are configured.
	pub const DEFAULT_PATTERNS: [&'static str; 3] = ["/login", "/refresh", "/auth"];

	/// Builds a matcher from the provided fragments.
	pub fn new<I, S>(patterns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(patterns.into_iter().map(Into::into).filter(|p: &String| !p.is_empty()).collect())
	}

	/// Returns `true` if `path` contains any configured fragment.
	pub fn matches(&self, path: &str) -> bool {
		self.0.iter().any(|pattern| path.contains(pattern.as_str()))
	}

	/// Returns the configured fragments.
	pub fn patterns(&self) -> &[String] {
		&self.0
	}
}
impl Default for AuthExemptions {
	fn default() -> Self {
		Self::new(Self::DEFAULT_PATTERNS)
	}
}

/// Attaches bearer tokens to outgoing requests, refreshing or ending the session as needed.
///
/// Clone the interceptor (or share it behind `Arc`) to authorize requests from many tasks; every
/// clone shares the same [`RefreshCoordinator`] and therefore the same in-flight refresh.
#[derive(Clone)]
pub struct SessionInterceptor {
	collaborators: Collaborators,
	coordinator: Arc<RefreshCoordinator>,
	policy: ExpiryPolicy,
	exemptions: AuthExemptions,
}
impl SessionInterceptor {
	/// Creates an interceptor with its own coordinator, the default policy, and default exemptions.
	pub fn new(
		store: Arc<dyn TokenStore>,
		client: Arc<dyn RefreshClient>,
		logout: Arc<dyn LogoutHook>,
	) -> Self {
		Self {
			collaborators: Collaborators::new(store, client, logout),
			coordinator: Default::default(),
			policy: ExpiryPolicy::default(),
			exemptions: AuthExemptions::default(),
		}
	}

	/// Applies the expiry buffer and exemptions from `config`.
	pub fn with_config(self, config: &ClientConfig) -> Self {
		self.with_policy(config.expiry_policy()).with_exemptions(config.exemptions().clone())
	}

	/// Overrides the expiry policy.
	pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the auth-exempt path fragments.
	pub fn with_exemptions(mut self, exemptions: AuthExemptions) -> Self {
		self.exemptions = exemptions;

		self
	}

	/// Shares `coordinator` with other interceptors so their refreshes coalesce.
	pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
		self.coordinator = coordinator;

		self
	}

	/// Returns the refresh coordinator.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Returns the expiry policy.
	pub fn policy(&self) -> ExpiryPolicy {
		self.policy
	}

	/// Authorizes `request`, returning it with `Authorization` set when a session exists.
	pub async fn intercept<R>(&self, request: R) -> Result<R>
	where
		R: InterceptedRequest,
	{
		self.intercept_with_outcome(request).await.map(|(request, _)| request)
	}

	/// Same as [`SessionInterceptor::intercept`], also reporting the state reached.
	pub async fn intercept_with_outcome<R>(&self, mut request: R) -> Result<(R, InterceptOutcome)>
	where
		R: InterceptedRequest,
	{
		if self.exemptions.matches(request.target_path()) {
			obs::record_intercept_outcome(InterceptOutcome::Bypass);

			return Ok((request, InterceptOutcome::Bypass));
		}

		let span = SessionSpan::new(SessionStage::Intercept, "intercept");

		obs::record_stage_outcome(SessionStage::Intercept, StageOutcome::Attempt);

		let result = span.instrument(self.authorize(&mut request)).await;

		match result {
			Ok(outcome) => {
				obs::record_stage_outcome(SessionStage::Intercept, StageOutcome::Success);
				obs::record_intercept_outcome(outcome);

				Ok((request, outcome))
			},
			Err(e) => {
				obs::record_stage_outcome(SessionStage::Intercept, StageOutcome::Failure);

				if matches!(e, Error::SessionExpired) {
					obs::record_intercept_outcome(InterceptOutcome::SessionExpired);
				}

				Err(e)
			},
		}
	}

	async fn authorize<R>(&self, request: &mut R) -> Result<InterceptOutcome>
	where
		R: InterceptedRequest,
	{
		self.coordinator.wait_in_flight().await?;

		let Some(bundle) = self.collaborators.store.load().await? else {
			tracing::debug!("No stored session; sending the request without credentials.");

			return Ok(InterceptOutcome::NoToken);
		};

		if !self.policy.is_near_or_past_expiry(Some(bundle.session_expires_at)) {
			return Ok(Self::attach(request, &bundle, InterceptOutcome::Valid));
		}
		if self.policy.is_near_or_past_expiry(Some(bundle.refresh_expires_at)) {
			tracing::info!("Refresh token expired; ending the session.");

			self.collaborators.end_session().await;

			return Err(Error::SessionExpired);
		}

		tracing::debug!("Session token is near expiry; refreshing.");

		self.coordinator.refresh(&bundle, &self.collaborators).await?;

		match self.collaborators.store.load().await? {
			Some(fresh) => Ok(Self::attach(request, &fresh, InterceptOutcome::Refreshed)),
			None => {
				tracing::debug!("No stored session after refresh; sending without credentials.");

				Ok(InterceptOutcome::NoToken)
			},
		}
	}

	fn attach<R>(
		request: &mut R,
		bundle: &TokenBundle,
		outcome: InterceptOutcome,
	) -> InterceptOutcome
	where
		R: InterceptedRequest,
	{
		match HeaderValue::from_str(&bundle.bearer_value()) {
			Ok(mut value) => {
				value.set_sensitive(true);
				request.headers_mut().insert(AUTHORIZATION, value);

				outcome
			},
			Err(_) => {
				tracing::debug!("Stored session token is not a valid header value; ignoring it.");

				InterceptOutcome::NoToken
			},
		}
	}
}
impl Debug for SessionInterceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionInterceptor")
			.field("coordinator", &self.coordinator)
			.field("policy", &self.policy)
			.field("exemptions", &self.exemptions)
			.finish()
	}
}
