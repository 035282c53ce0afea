//! Login, sign-up, logout, and session status for the screens that sit above the interceptor.

// self
use crate::{
	_prelude::*,
	auth::{ExpiryPolicy, TokenBundle},
	http::{AuthorizedClient, LoginClient, LoginCredentials, RefreshFuture},
	obs::{self, SessionSpan, SessionStage, StageOutcome},
	session::LogoutHook,
	store::TokenStore,
};

/// Whether a usable session exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionStatus {
	/// A bundle with a live refresh token is stored; the interceptor can keep it fresh.
	LoggedIn,
	/// No usable bundle is stored.
	LoggedOut,
}

#[derive(Clone, Debug)]
struct RemoteLogout {
	client: AuthorizedClient,
	base_url: Url,
}

/// Facade over login/sign-up/logout and the startup session check.
#[derive(Clone)]
pub struct SessionManager {
	store: Arc<dyn TokenStore>,
	login_client: Arc<dyn LoginClient>,
	logout: Arc<dyn LogoutHook>,
	policy: ExpiryPolicy,
	remote_logout: Option<RemoteLogout>,
}
impl SessionManager {
	/// Creates a manager using the default expiry policy.
	pub fn new(
		store: Arc<dyn TokenStore>,
		login_client: Arc<dyn LoginClient>,
		logout: Arc<dyn LogoutHook>,
	) -> Self {
		Self { store, login_client, logout, policy: ExpiryPolicy::default(), remote_logout: None }
	}

	/// Overrides the expiry policy used by [`SessionManager::status`].
	pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Revokes the session server-side through `client` before every local logout.
	pub fn with_remote_logout(mut self, client: AuthorizedClient, base_url: Url) -> Self {
		self.remote_logout = Some(RemoteLogout { client, base_url });

		self
	}

	/// Exchanges `credentials` for a bundle and persists it.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenBundle> {
		self.establish(SessionStage::Login, self.login_client.login(credentials)).await
	}

	/// Creates an account for `credentials` and persists the bundle it was issued.
	pub async fn sign_up(&self, credentials: &LoginCredentials) -> Result<TokenBundle> {
		self.establish(SessionStage::SignUp, self.login_client.create_user(credentials)).await
	}

	/// Ends the session: revokes it server-side when configured, clears storage, and signals
	/// logout.
	///
	/// Logout is signalled even when clearing fails; the storage error is still returned. A failed
	/// server-side revocation is logged and never blocks the local logout.
	pub async fn logout(&self) -> Result<()> {
		let span = SessionSpan::new(SessionStage::Logout, "logout");

		obs::record_stage_outcome(SessionStage::Logout, StageOutcome::Attempt);

		let cleared = span
			.instrument(async {
				if let Some(remote) = &self.remote_logout
					&& let Err(e) = remote.client.revoke_session(&remote.base_url).await
				{
					tracing::warn!(error = %e, "Server-side logout failed; ending the session locally.");
				}

				self.store.clear().await
			})
			.await;

		self.logout.notify_logout();

		match cleared {
			Ok(()) => {
				obs::record_stage_outcome(SessionStage::Logout, StageOutcome::Success);

				Ok(())
			},
			Err(e) => {
				obs::record_stage_outcome(SessionStage::Logout, StageOutcome::Failure);
				tracing::warn!(error = %e, "Failed to clear stored tokens during logout.");

				Err(e.into())
			},
		}
	}

	/// Reports whether a usable session is stored.
	///
	/// A bundle whose refresh token has expired is cleared and reported as logged out. Storage
	/// failures are logged and reported as logged out rather than surfaced.
	pub async fn status(&self) -> SessionStatus {
		let bundle = match self.store.load().await {
			Ok(bundle) => bundle,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to read stored tokens while checking the session.");

				return SessionStatus::LoggedOut;
			},
		};
		let Some(bundle) = bundle else {
			return SessionStatus::LoggedOut;
		};

		if self.policy.is_near_or_past_expiry(Some(bundle.refresh_expires_at)) {
			if let Err(e) = self.store.clear().await {
				tracing::warn!(error = %e, "Failed to clear an expired session.");
			}

			return SessionStatus::LoggedOut;
		}

		SessionStatus::LoggedIn
	}

	async fn establish(
		&self,
		stage: SessionStage,
		exchange: RefreshFuture<'_, TokenBundle>,
	) -> Result<TokenBundle> {
		let span = SessionSpan::new(stage, stage.as_str());

		obs::record_stage_outcome(stage, StageOutcome::Attempt);

		let result = span
			.instrument(async {
				let bundle = exchange.await?;

				self.store.save(bundle.clone()).await?;

				Ok::<_, Error>(bundle)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(stage, StageOutcome::Success),
			Err(e) => {
				obs::record_stage_outcome(stage, StageOutcome::Failure);
				tracing::warn!(error = %e, stage = stage.as_str(), "Credential exchange failed.");
			},
		}

		result
	}
}
impl Debug for SessionManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionManager")
			.field("policy", &self.policy)
			.field("remote_logout", &self.remote_logout.as_ref().map(|r| r.base_url.as_str()))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, auth::TokenSecret, error::RefreshError};

	#[derive(Debug)]
	struct ScriptedLogin(Result<TokenBundle, RefreshError>);
	impl LoginClient for ScriptedLogin {
		fn login<'a>(&'a self, _credentials: &'a LoginCredentials) -> RefreshFuture<'a, TokenBundle> {
			Box::pin(async move { self.0.clone() })
		}

		fn create_user<'a>(
			&'a self,
			credentials: &'a LoginCredentials,
		) -> RefreshFuture<'a, TokenBundle> {
			Box::pin(async move {
				let bundle = self.0.clone()?;

				Ok(TokenBundle {
					session_token: TokenSecret::new(format!("{}-welcome", credentials.email)),
					..bundle
				})
			})
		}
	}

	fn manager(
		store: &Arc<CountingStore>,
		outcome: Result<TokenBundle, RefreshError>,
		logout: &Arc<CountingLogout>,
	) -> SessionManager {
		SessionManager::new(store.clone(), Arc::new(ScriptedLogin(outcome)), logout.clone())
	}

	#[tokio::test]
	async fn login_persists_the_issued_bundle() {
		let issued = bundle_expiring_in("issued", Duration::hours(1), Duration::days(7));
		let store = Arc::new(CountingStore::seeded(None).await);
		let logout = Arc::new(CountingLogout::default());
		let manager = manager(&store, Ok(issued.clone()), &logout);
		let bundle = manager
			.login(&LoginCredentials::new("cook@receiptr.test", "hunter2"))
			.await
			.expect("Login should succeed.");

		assert_eq!(bundle, issued);
		assert_eq!(store.load().await.expect("Load should succeed."), Some(issued));
		assert_eq!(manager.status().await, SessionStatus::LoggedIn);
	}

	#[tokio::test]
	async fn rejected_login_leaves_storage_untouched() {
		let store = Arc::new(CountingStore::seeded(None).await);
		let logout = Arc::new(CountingLogout::default());
		let err = manager(
			&store,
			Err(RefreshError::Rejected { message: "invalid credentials".into() }),
			&logout,
		)
		.login(&LoginCredentials::new("cook@receiptr.test", "wrong"))
		.await
		.expect_err("Rejected logins should surface.");

		assert!(matches!(err, Error::Refresh(RefreshError::Rejected { .. })));
		assert_eq!(store.saves(), 0);
		assert_eq!(logout.count(), 0);
	}

	#[tokio::test]
	async fn logout_clears_then_notifies() {
		let live = bundle_expiring_in("live", Duration::hours(1), Duration::days(7));
		let store = Arc::new(CountingStore::seeded(Some(live.clone())).await);
		let logout = Arc::new(CountingLogout::default());
		let manager = manager(&store, Ok(live), &logout);

		manager.logout().await.expect("Logout should succeed.");

		assert_eq!(store.clears(), 1);
		assert_eq!(logout.count(), 1);
		assert_eq!(manager.status().await, SessionStatus::LoggedOut);
	}

	#[tokio::test]
	async fn sign_up_persists_the_first_bundle() {
		let issued = bundle_expiring_in("issued", Duration::hours(1), Duration::days(7));
		let store = Arc::new(CountingStore::seeded(None).await);
		let logout = Arc::new(CountingLogout::default());
		let manager = manager(&store, Ok(issued), &logout);
		let bundle = manager
			.sign_up(&LoginCredentials::new("new@receiptr.test", "hunter2"))
			.await
			.expect("Sign-up should succeed.");

		assert_eq!(bundle.session_token.expose(), "new@receiptr.test-welcome");
		assert_eq!(store.saves(), 1);
		assert_eq!(store.load().await.expect("Load should succeed."), Some(bundle));
	}

	#[tokio::test]
	async fn logout_notifies_even_when_clearing_fails() {
		let live = bundle_expiring_in("live", Duration::hours(1), Duration::days(7));
		let mut store = CountingStore::seeded(Some(live.clone())).await;

		store.fail_clears = true;

		let store = Arc::new(store);
		let logout = Arc::new(CountingLogout::default());
		let err = manager(&store, Ok(live), &logout)
			.logout()
			.await
			.expect_err("Clear failures should surface.");

		assert!(matches!(err, Error::Storage(_)));
		assert_eq!(store.clears(), 1);
		assert_eq!(logout.count(), 1);
	}

	#[tokio::test]
	async fn status_clears_sessions_with_expired_refresh_tokens() {
		let dead = bundle_expiring_in("dead", Duration::hours(-2), Duration::seconds(-1));
		let store = Arc::new(CountingStore::seeded(Some(dead.clone())).await);
		let logout = Arc::new(CountingLogout::default());
		let manager = manager(&store, Ok(dead), &logout);

		assert_eq!(manager.status().await, SessionStatus::LoggedOut);
		assert_eq!(store.clears(), 1);
		assert_eq!(logout.count(), 0);
	}

	#[tokio::test]
	async fn status_tolerates_expired_session_tokens() {
		let stale = bundle_expiring_in("stale", Duration::hours(-1), Duration::days(1));
		let store = Arc::new(CountingStore::seeded(Some(stale.clone())).await);
		let logout = Arc::new(CountingLogout::default());

		assert_eq!(manager(&store, Ok(stale), &logout).status().await, SessionStatus::LoggedIn);
	}
}
