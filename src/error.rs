//! Session-level error types shared by the interceptor, coordinator, stores, and transport.
//!
//! [`Error`] is `Clone` so one refresh outcome can be handed to every request that waited on it.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Token refresh failed; storage was cleared and logout was signalled.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// Outgoing request could not be delivered.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The refresh token expired; the user must sign in again.
	#[error("Session expired, please login again.")]
	SessionExpired,
}

/// Failures raised while exchanging credentials for a token bundle.
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// No bundle (and therefore no refresh token) was available.
	#[error("No refresh token available.")]
	MissingRefreshToken,
	/// Backend rejected the refresh token or credentials.
	#[error("Auth endpoint rejected the request: {message}.")]
	Rejected {
		/// Backend- or client-supplied reason string.
		message: String,
	},
	/// Backend answered with a status the client does not understand.
	#[error("Auth endpoint returned HTTP {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Response body excerpt, when available.
		body: Option<String>,
	},
	/// Network failure while calling the auth endpoint.
	#[error("Network error occurred while calling the auth endpoint.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// Auth endpoint responded with JSON that could not be parsed.
	#[error("Auth endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Auth endpoint responded with a payload that does not form a complete bundle.
	#[error("Auth endpoint returned an unusable token bundle: {reason}.")]
	InvalidResponse {
		/// What was missing or invalid.
		reason: String,
	},
}
impl RefreshError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<ReqwestError> for RefreshError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for RefreshError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::MalformedResponse { source: Arc::new(e) }
	}
}

/// Transport-level failures surfaced by [`AuthorizedClient`](crate::http::AuthorizedClient).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Server answered a session call with a non-success status.
	#[error("Server returned HTTP {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Required environment variable is not set.
	#[error("{name} is not configured.")]
	MissingVar {
		/// Variable name.
		name: &'static str,
	},
	/// Base URL cannot be parsed.
	#[error("API base URL `{value}` is invalid.")]
	InvalidBaseUrl {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Environment label is not recognized.
	#[error("Environment `{value}` is not one of development or production.")]
	UnknownEnvironment {
		/// Offending value.
		value: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Builder failure rendered as text.
		message: String,
	},
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::HttpClientBuild { message: e.to_string() }
	}
}
