//! Storage contracts for the token bundle plus the key/value adapter and built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{self, TokenBundle},
};

/// Boxed future returned by storage contracts.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Read/write/clear contract for the single persisted [`TokenBundle`].
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the stored bundle; partial or garbled data is reported as `None`.
	fn load(&self) -> StoreFuture<'_, Option<TokenBundle>>;

	/// Replaces the stored bundle wholesale.
	fn save(&self, bundle: TokenBundle) -> StoreFuture<'_, ()>;

	/// Removes the stored bundle.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// String key/value contract implemented by secure-storage backends.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`, if any.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Deletes `key`; deleting a missing key is not an error.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Writes every entry in one step; backends override this when they can do it atomically.
	fn set_many<'a>(&'a self, entries: Vec<(&'a str, String)>) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			for (key, value) in entries {
				self.set(key, value).await?;
			}

			Ok(())
		})
	}

	/// Deletes every key in one step; backends override this when they can do it atomically.
	fn delete_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			for key in keys.iter().copied() {
				self.delete(key).await?;
			}

			Ok(())
		})
	}
}

/// Error type produced by [`TokenStore`] and [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Keys under which the four bundle fields are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageKeys {
	/// Key for the session token.
	pub session_token: &'static str,
	/// Key for the refresh token.
	pub refresh_token: &'static str,
	/// Key for the session expiry timestamp.
	pub session_expires: &'static str,
	/// Key for the refresh expiry timestamp.
	pub refresh_expires: &'static str,
}
impl StorageKeys {
	/// Keys used by the Receiptr mobile app.
	pub const RECEIPTR: Self = Self {
		session_token: "receiptr_session_token",
		refresh_token: "receiptr_refresh_token",
		session_expires: "receiptr_session_expires",
		refresh_expires: "receiptr_refresh_expires",
	};

	fn all(&self) -> [&'static str; 4] {
		[self.session_token, self.refresh_token, self.session_expires, self.refresh_expires]
	}
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self::RECEIPTR
	}
}

/// Maps a [`TokenBundle`] onto four entries of a [`KeyValueStore`].
///
/// Expiries are written as RFC 3339 UTC strings and read back with
/// [`parse_utc_timestamp`](auth::parse_utc_timestamp), so values written by older clients
/// without a zone marker still load as UTC.
#[derive(Clone, Debug, Default)]
pub struct KeyValueTokenStore<S> {
	backend: S,
	keys: StorageKeys,
}
impl<S> KeyValueTokenStore<S>
where
	S: KeyValueStore,
{
	/// Wraps `backend` using the default key set.
	pub fn new(backend: S) -> Self {
		Self { backend, keys: StorageKeys::default() }
	}

	/// Overrides the keys used for persistence.
	pub fn with_keys(mut self, keys: StorageKeys) -> Self {
		self.keys = keys;

		self
	}

	/// Returns the wrapped backend.
	pub fn backend(&self) -> &S {
		&self.backend
	}

	fn encode(bundle: &TokenBundle) -> Result<[String; 2], StoreError> {
		let format = |instant: OffsetDateTime| {
			instant.format(&Rfc3339).map_err(|e| StoreError::Serialization {
				message: format!("Failed to format expiry {instant}: {e}"),
			})
		};

		Ok([format(bundle.session_expires_at)?, format(bundle.refresh_expires_at)?])
	}
}
impl<S> TokenStore for KeyValueTokenStore<S>
where
	S: KeyValueStore,
{
	fn load(&self) -> StoreFuture<'_, Option<TokenBundle>> {
		Box::pin(async move {
			let session_token = self.backend.get(self.keys.session_token).await?;
			let refresh_token = self.backend.get(self.keys.refresh_token).await?;
			let session_expires = self.backend.get(self.keys.session_expires).await?;
			let refresh_expires = self.backend.get(self.keys.refresh_expires).await?;
			let (
				Some(session_token),
				Some(refresh_token),
				Some(session_expires),
				Some(refresh_expires),
			) = (session_token, refresh_token, session_expires, refresh_expires)
			else {
				tracing::debug!("Stored token bundle is incomplete; treating it as absent.");

				return Ok(None);
			};
			let (Some(session_expires_at), Some(refresh_expires_at)) = (
				auth::parse_utc_timestamp(&session_expires),
				auth::parse_utc_timestamp(&refresh_expires),
			) else {
				tracing::debug!("Stored token expiry is unparseable; treating the bundle as absent.");

				return Ok(None);
			};
			let bundle = TokenBundle::builder()
				.session_token(session_token)
				.refresh_token(refresh_token)
				.session_expires_at(session_expires_at)
				.refresh_expires_at(refresh_expires_at)
				.build();

			match bundle {
				Ok(bundle) => Ok(Some(bundle)),
				Err(e) => {
					tracing::debug!(error = %e, "Stored token bundle is invalid; treating it as absent.");

					Ok(None)
				},
			}
		})
	}

	fn save(&self, bundle: TokenBundle) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let [session_expires, refresh_expires] = Self::encode(&bundle)?;

			self.backend
				.set_many(vec![
					(self.keys.session_token, bundle.session_token.expose().to_owned()),
					(self.keys.refresh_token, bundle.refresh_token.expose().to_owned()),
					(self.keys.session_expires, session_expires),
					(self.keys.refresh_expires, refresh_expires),
				])
				.await
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let keys = self.keys.all();

			self.backend.delete_many(&keys).await
		})
	}
}
