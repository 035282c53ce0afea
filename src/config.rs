//! Client configuration: backend location, deployment environment, and session tuning.

// self
use crate::{_prelude::*, auth::ExpiryPolicy, error::ConfigError, session::AuthExemptions};

/// Deployment environment the client talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Environment {
	/// Local or staging backends.
	#[default]
	Development,
	/// The production backend.
	Production,
}
impl Environment {
	/// Returns the lowercase label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Development => "development",
			Self::Production => "production",
		}
	}

	/// Returns `true` for [`Environment::Development`].
	pub const fn is_development(self) -> bool {
		matches!(self, Self::Development)
	}

	/// Returns `true` for [`Environment::Production`].
	pub const fn is_production(self) -> bool {
		matches!(self, Self::Production)
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"development" => Ok(Self::Development),
			"production" => Ok(Self::Production),
			_ => Err(ConfigError::UnknownEnvironment { value: s.to_owned() }),
		}
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Resolved client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	base_url: Url,
	environment: Environment,
	expiry_policy: ExpiryPolicy,
	exemptions: AuthExemptions,
	device_info: Option<String>,
}
impl ClientConfig {
	/// Variable holding the backend base URL.
	pub const API_URL_VAR: &'static str = "RECEIPTR_API_URL";
	/// Variable holding the environment label.
	pub const ENVIRONMENT_VAR: &'static str = "RECEIPTR_ENVIRONMENT";

	/// Starts a builder rooted at `base_url`.
	pub fn builder(base_url: impl AsRef<str>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url.as_ref())
	}

	/// Reads `RECEIPTR_API_URL` (required) and `RECEIPTR_ENVIRONMENT` (optional, defaults to
	/// `development`) from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Same as [`ClientConfig::from_env`], resolving variables through `lookup`.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let base_url =
			non_empty(Self::API_URL_VAR).ok_or(ConfigError::MissingVar { name: Self::API_URL_VAR })?;
		let mut builder = Self::builder(base_url.trim());

		if let Some(environment) = non_empty(Self::ENVIRONMENT_VAR) {
			builder = builder.environment(environment.trim().parse()?);
		}

		builder.build()
	}

	/// Backend base URL, always ending in `/`.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Deployment environment.
	pub fn environment(&self) -> Environment {
		self.environment
	}

	/// Expiry policy applied to stored tokens.
	pub fn expiry_policy(&self) -> ExpiryPolicy {
		self.expiry_policy
	}

	/// Request paths that never carry credentials.
	pub fn exemptions(&self) -> &AuthExemptions {
		&self.exemptions
	}

	/// Device description sent with refresh requests.
	pub fn device_info(&self) -> Option<&str> {
		self.device_info.as_deref()
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	base_url: String,
	environment: Environment,
	expiry_policy: ExpiryPolicy,
	exemptions: AuthExemptions,
	device_info: Option<String>,
}
impl ClientConfigBuilder {
	fn new(base_url: &str) -> Self {
		Self {
			base_url: base_url.to_owned(),
			environment: Environment::default(),
			expiry_policy: ExpiryPolicy::default(),
			exemptions: AuthExemptions::default(),
			device_info: None,
		}
	}

	/// Sets the deployment environment.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;

		self
	}

	/// Sets the expiry policy.
	pub fn expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
		self.expiry_policy = policy;

		self
	}

	/// Sets the expiry buffer in (possibly fractional) minutes.
	pub fn expiry_buffer_minutes(self, minutes: f64) -> Self {
		self.expiry_policy(ExpiryPolicy::from_minutes(minutes))
	}

	/// Replaces the exempt path fragments.
	pub fn exemptions(mut self, exemptions: AuthExemptions) -> Self {
		self.exemptions = exemptions;

		self
	}

	/// Sets the device description sent with refresh requests.
	pub fn device_info(mut self, info: impl Into<String>) -> Self {
		self.device_info = Some(info.into());

		self
	}

	/// Validates the base URL and produces the configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = Url::parse(&self.base_url).map_err(|source| {
			ConfigError::InvalidBaseUrl { value: self.base_url.clone(), source }
		})?;

		if base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl {
				value: self.base_url,
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			});
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		Ok(ClientConfig {
			base_url,
			environment: self.environment,
			expiry_policy: self.expiry_policy,
			exemptions: self.exemptions,
			device_info: self.device_info,
		})
	}
}
