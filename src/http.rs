//! Transport pieces: the refresh/login client contracts, their reqwest implementation, and the
//! authorized client that runs every outgoing request through the session interceptor.
//!
//! The backend speaks JSON on three public endpoints, `POST /public/login`,
//! `POST /public/createUser`, and `POST /public/refresh`; all answer with the same
//! `LoginResponse` payload, which [`LoginResponse::into_bundle`] turns into a [`TokenBundle`].
//! The authenticated `POST /private/logout` revokes the session server-side.

// crates.io
use reqwest::{Request, RequestBuilder, Response, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::{self, TokenBundle, TokenSecret},
	config::ClientConfig,
	error::{ConfigError, RefreshError, TransportError},
	session::SessionInterceptor,
};

/// Boxed future returned by credential exchanges.
pub type RefreshFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, RefreshError>> + 'a + Send>>;

/// Exchanges a refresh token for a new [`TokenBundle`].
pub trait RefreshClient
where
	Self: Send + Sync,
{
	/// Performs the refresh exchange.
	fn refresh_session<'a>(&'a self, refresh_token: &'a TokenSecret)
	-> RefreshFuture<'a, TokenBundle>;
}

/// Exchanges user credentials for a new [`TokenBundle`].
pub trait LoginClient
where
	Self: Send + Sync,
{
	/// Performs the login exchange.
	fn login<'a>(&'a self, credentials: &'a LoginCredentials) -> RefreshFuture<'a, TokenBundle>;

	/// Registers a new account and returns its first bundle.
	fn create_user<'a>(
		&'a self,
		credentials: &'a LoginCredentials,
	) -> RefreshFuture<'a, TokenBundle>;
}

/// Email/password pair submitted to the login and sign-up endpoints.
#[derive(Clone)]
pub struct LoginCredentials {
	/// Account email.
	pub email: String,
	/// Account password; never logged.
	pub password: TokenSecret,
}
impl LoginCredentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: TokenSecret::new(password) }
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Token entry inside a [`LoginResponse`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
	/// Token value.
	pub token: Option<String>,
	/// Expiry timestamp, with or without a zone marker.
	pub expires_at: Option<String>,
}

/// Payload returned by the login and refresh endpoints.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
	/// Session token entry.
	pub session_token: Option<IssuedToken>,
	/// Refresh token entry.
	pub refresh_token: Option<IssuedToken>,
}
impl LoginResponse {
	/// Converts the payload into a bundle, rejecting missing fields and unparseable expiries.
	pub fn into_bundle(self) -> Result<TokenBundle, RefreshError> {
		let (session_token, session_expires) = Self::split(self.session_token)?;
		let (refresh_token, refresh_expires) = Self::split(self.refresh_token)?;
		let builder = TokenBundle::builder()
			.session_token(session_token)
			.refresh_token(refresh_token)
			.session_expires_at(Self::parse_expiry(&session_expires)?)
			.refresh_expires_at(Self::parse_expiry(&refresh_expires)?);

		builder.build().map_err(|e| RefreshError::InvalidResponse { reason: e.to_string() })
	}

	fn split(entry: Option<IssuedToken>) -> Result<(String, String), RefreshError> {
		match entry {
			Some(IssuedToken { token: Some(token), expires_at: Some(expires_at) })
				if !token.is_empty() && !expires_at.is_empty() =>
				Ok((token, expires_at)),
			_ => Err(RefreshError::InvalidResponse {
				reason: "missing required token fields".into(),
			}),
		}
	}

	fn parse_expiry(raw: &str) -> Result<OffsetDateTime, RefreshError> {
		auth::parse_utc_timestamp(raw).ok_or_else(|| RefreshError::InvalidResponse {
			reason: format!("unparseable expiry `{raw}`"),
		})
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest<'a> {
	refresh_token: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	device_info: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginCommand<'a> {
	auth_method: &'static str,
	email: &'a str,
	password: &'a str,
}

/// Reqwest-backed [`RefreshClient`] and [`LoginClient`] for the Receiptr backend.
///
/// Endpoint mapping: HTTP 401 becomes [`RefreshError::Rejected`], any other non-2xx status
/// [`RefreshError::UnexpectedStatus`] (with a body excerpt, e.g. "user already exists" on sign-up).
///
/// Auth endpoints return results directly, so any custom [`ReqwestClient`] passed in should not
/// follow redirects.
#[derive(Clone, Debug)]
pub struct ReqwestAuthClient {
	client: ReqwestClient,
	refresh_url: Url,
	login_url: Url,
	create_user_url: Url,
	device_info: Option<String>,
}
impl ReqwestAuthClient {
	const BODY_EXCERPT_LIMIT: usize = 512;

	/// Builds a client for the backend rooted at `base_url`.
	pub fn new(base_url: &Url) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Self::with_client(client, base_url)
	}

	/// Builds a client that reuses the caller-provided [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, base_url: &Url) -> Result<Self, ConfigError> {
		let endpoint = |path: &str| {
			base_url.join(path).map_err(|source| ConfigError::InvalidBaseUrl {
				value: base_url.to_string(),
				source,
			})
		};

		Ok(Self {
			refresh_url: endpoint("public/refresh")?,
			login_url: endpoint("public/login")?,
			create_user_url: endpoint("public/createUser")?,
			client,
			device_info: None,
		})
	}

	/// Builds a client from a [`ClientConfig`], carrying over its device info.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = Self::new(config.base_url())?;

		Ok(match config.device_info() {
			Some(info) => client.with_device_info(info),
			None => client,
		})
	}

	/// Sets the device description sent alongside refresh requests.
	pub fn with_device_info(mut self, info: impl Into<String>) -> Self {
		self.device_info = Some(info.into());

		self
	}

	/// Returns the resolved refresh endpoint.
	pub fn refresh_url(&self) -> &Url {
		&self.refresh_url
	}

	/// Returns the resolved login endpoint.
	pub fn login_url(&self) -> &Url {
		&self.login_url
	}

	/// Returns the resolved sign-up endpoint.
	pub fn create_user_url(&self) -> &Url {
		&self.create_user_url
	}

	async fn exchange<B>(
		&self,
		url: &Url,
		body: &B,
		rejected: &'static str,
	) -> Result<TokenBundle, RefreshError>
	where
		B: Serialize + Sync,
	{
		let response = self.client.post(url.clone()).json(body).send().await?;
		let status = response.status();
		let bytes = response.bytes().await?;

		if status == StatusCode::UNAUTHORIZED {
			return Err(RefreshError::Rejected { message: rejected.into() });
		}
		if !status.is_success() {
			let excerpt = String::from_utf8_lossy(&bytes);
			let body = (!excerpt.is_empty())
				.then(|| excerpt.chars().take(Self::BODY_EXCERPT_LIMIT).collect());

			return Err(RefreshError::UnexpectedStatus { status: status.as_u16(), body });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let payload: LoginResponse = serde_path_to_error::deserialize(&mut deserializer)?;

		payload.into_bundle()
	}
}
impl RefreshClient for ReqwestAuthClient {
	fn refresh_session<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> RefreshFuture<'a, TokenBundle> {
		Box::pin(async move {
			let body = RefreshTokenRequest {
				refresh_token: refresh_token.expose(),
				device_info: self.device_info.as_deref(),
			};

			self.exchange(&self.refresh_url, &body, "Invalid or expired refresh token").await
		})
	}
}
impl LoginClient for ReqwestAuthClient {
	fn login<'a>(&'a self, credentials: &'a LoginCredentials) -> RefreshFuture<'a, TokenBundle> {
		Box::pin(async move {
			let body = LoginCommand {
				auth_method: "EMAIL_PASSWORD",
				email: &credentials.email,
				password: credentials.password.expose(),
			};

			self.exchange(&self.login_url, &body, "Authentication failed - invalid credentials")
				.await
		})
	}

	fn create_user<'a>(
		&'a self,
		credentials: &'a LoginCredentials,
	) -> RefreshFuture<'a, TokenBundle> {
		Box::pin(async move {
			let body = LoginCommand {
				auth_method: "EMAIL_PASSWORD",
				email: &credentials.email,
				password: credentials.password.expose(),
			};

			self.exchange(&self.create_user_url, &body, "Account creation was not authorized").await
		})
	}
}

/// HTTP client that authorizes every outgoing request through a [`SessionInterceptor`].
#[derive(Clone, Debug)]
pub struct AuthorizedClient {
	client: ReqwestClient,
	interceptor: Arc<SessionInterceptor>,
}
impl AuthorizedClient {
	/// Wraps `client`, routing requests through `interceptor`.
	pub fn new(client: ReqwestClient, interceptor: impl Into<Arc<SessionInterceptor>>) -> Self {
		Self { client, interceptor: interceptor.into() }
	}

	/// Returns the wrapped interceptor.
	pub fn interceptor(&self) -> &SessionInterceptor {
		&self.interceptor
	}

	/// Starts building a request with the wrapped [`ReqwestClient`].
	pub fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
		self.client.request(method, url)
	}

	/// Builds and sends a request prepared with [`AuthorizedClient::request`].
	pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let request = builder.build().map_err(TransportError::from)?;

		self.execute(request).await
	}

	/// Authorizes and sends `request`.
	pub async fn execute(&self, request: Request) -> Result<Response> {
		let request = self.interceptor.intercept(request).await?;

		Ok(self.client.execute(request).await.map_err(TransportError::from)?)
	}

	/// Revokes the current session server-side with `POST {base}/private/logout`.
	pub async fn revoke_session(&self, base_url: &Url) -> Result<()> {
		let url = base_url.join("private/logout").map_err(|source| ConfigError::InvalidBaseUrl {
			value: base_url.to_string(),
			source,
		})?;
		let response = self.send(self.request(reqwest::Method::POST, url)).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(TransportError::UnexpectedStatus { status: status.as_u16() }.into());
		}

		Ok(())
	}
}
