//! The persisted session/refresh token pair and its builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Errors produced by [`TokenBundleBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBundleError {
	/// Issued when no (or an empty) session token was provided.
	#[error("Session token is required.")]
	MissingSessionToken,
	/// Issued when no (or an empty) refresh token was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when the session expiry was not supplied.
	#[error("Session expiry is required.")]
	MissingSessionExpiry,
	/// Issued when the refresh expiry was not supplied.
	#[error("Refresh expiry is required.")]
	MissingRefreshExpiry,
}

/// Complete set of credentials issued by a login or refresh exchange.
///
/// A bundle is only ever constructed with all four fields present; storage backends that find a
/// partial bundle report it as absent instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Short-lived bearer credential attached to API requests.
	pub session_token: TokenSecret,
	/// Longer-lived credential used only to obtain new bundles.
	pub refresh_token: TokenSecret,
	/// Absolute UTC expiry of the session token.
	pub session_expires_at: OffsetDateTime,
	/// Absolute UTC expiry of the refresh token.
	pub refresh_expires_at: OffsetDateTime,
}
impl TokenBundle {
	/// Returns a builder that validates every field is present.
	pub fn builder() -> TokenBundleBuilder {
		TokenBundleBuilder::default()
	}

	/// Formats the bearer credential for an `Authorization` header.
	pub fn bearer_value(&self) -> String {
		format!("Bearer {}", self.session_token.expose())
	}
}
impl Debug for TokenBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBundle")
			.field("session_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("session_expires_at", &self.session_expires_at)
			.field("refresh_expires_at", &self.refresh_expires_at)
			.finish()
	}
}

/// Builder for [`TokenBundle`].
#[derive(Clone, Debug, Default)]
pub struct TokenBundleBuilder {
	session_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	session_expires_at: Option<OffsetDateTime>,
	refresh_expires_at: Option<OffsetDateTime>,
}
impl TokenBundleBuilder {
	/// Provides the session token value.
	pub fn session_token(mut self, token: impl Into<String>) -> Self {
		self.session_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the session expiry; the instant is normalized to UTC.
	pub fn session_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.session_expires_at = Some(instant.to_offset(time::UtcOffset::UTC));

		self
	}

	/// Sets the refresh expiry; the instant is normalized to UTC.
	pub fn refresh_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.refresh_expires_at = Some(instant.to_offset(time::UtcOffset::UTC));

		self
	}

	/// Consumes the builder and produces a [`TokenBundle`].
	pub fn build(self) -> Result<TokenBundle, TokenBundleError> {
		let session_token = self
			.session_token
			.filter(|token| !token.is_empty())
			.ok_or(TokenBundleError::MissingSessionToken)?;
		let refresh_token = self
			.refresh_token
			.filter(|token| !token.is_empty())
			.ok_or(TokenBundleError::MissingRefreshToken)?;
		let session_expires_at =
			self.session_expires_at.ok_or(TokenBundleError::MissingSessionExpiry)?;
		let refresh_expires_at =
			self.refresh_expires_at.ok_or(TokenBundleError::MissingRefreshExpiry)?;

		Ok(TokenBundle { session_token, refresh_token, session_expires_at, refresh_expires_at })
	}
}
