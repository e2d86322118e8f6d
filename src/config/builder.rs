// self
use crate::{
	_prelude::*,
	auth::TenantId,
	config::{AuthEndpoints, ClientConfig, RefreshPolicy},
};

/// Errors raised while constructing or validating configurations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// Endpoints must use HTTP or HTTPS.
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// The base URL cannot carry a query string or fragment.
	#[error("The base URL must not carry a query or fragment: {url}.")]
	BaseUrlHasQuery {
		/// URL that failed validation.
		url: String,
	},
	/// The login route must be an absolute in-app path.
	#[error("The login route must start with `/`: {route}.")]
	InvalidLoginRoute {
		/// Route that failed validation.
		route: String,
	},
	/// A zero timeout would fail every request.
	#[error("The request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Default endpoints could not be derived from the base URL origin.
	#[error("The base URL `{url}` has no origin to derive auth endpoints from.")]
	OpaqueOrigin {
		/// URL that failed validation.
		url: String,
	},
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfigBuilder {
	/// Base URL for relative request paths.
	pub base_url: Url,
	/// Tenant identifier.
	pub tenant: TenantId,
	/// Refresh endpoint override.
	#[serde(default)]
	pub refresh_endpoint: Option<Url>,
	/// Blacklist endpoint override.
	#[serde(default)]
	pub blacklist_endpoint: Option<Url>,
	/// Login endpoint override.
	#[serde(default)]
	pub login_endpoint: Option<Url>,
	/// Login route override.
	#[serde(default)]
	pub login_route: Option<String>,
	/// Request timeout override.
	#[serde(default)]
	pub request_timeout: Option<StdDuration>,
	/// Refresh policy.
	#[serde(default)]
	pub refresh_policy: RefreshPolicy,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided base URL and tenant.
	pub fn new(base_url: Url, tenant: TenantId) -> Self {
		Self {
			base_url,
			tenant,
			refresh_endpoint: None,
			blacklist_endpoint: None,
			login_endpoint: None,
			login_route: None,
			request_timeout: None,
			refresh_policy: RefreshPolicy::default(),
		}
	}

	/// Overrides the refresh endpoint.
	pub fn refresh_endpoint(mut self, url: Url) -> Self {
		self.refresh_endpoint = Some(url);

		self
	}

	/// Overrides the blacklist endpoint.
	pub fn blacklist_endpoint(mut self, url: Url) -> Self {
		self.blacklist_endpoint = Some(url);

		self
	}

	/// Overrides the login endpoint.
	pub fn login_endpoint(mut self, url: Url) -> Self {
		self.login_endpoint = Some(url);

		self
	}

	/// Overrides the route announced when a session expires.
	pub fn login_route(mut self, route: impl Into<String>) -> Self {
		self.login_route = Some(route.into());

		self
	}

	/// Overrides the default request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the concurrent refresh policy.
	pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
		self.refresh_policy = policy;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		validate_scheme("base", &self.base_url)?;

		if self.base_url.query().is_some() || self.base_url.fragment().is_some() {
			return Err(ClientConfigError::BaseUrlHasQuery { url: self.base_url.to_string() });
		}

		let base_url = with_trailing_slash(self.base_url);
		let endpoints = AuthEndpoints {
			refresh: endpoint_or_default(self.refresh_endpoint, &base_url, ClientConfig::REFRESH_PATH)?,
			blacklist: endpoint_or_default(
				self.blacklist_endpoint,
				&base_url,
				ClientConfig::BLACKLIST_PATH,
			)?,
			login: endpoint_or_default(self.login_endpoint, &base_url, ClientConfig::LOGIN_PATH)?,
		};
		let config = ClientConfig {
			base_url,
			tenant: self.tenant,
			endpoints,
			login_route: self
				.login_route
				.unwrap_or_else(|| ClientConfig::DEFAULT_LOGIN_ROUTE.to_owned()),
			request_timeout: self.request_timeout.unwrap_or(ClientConfig::DEFAULT_TIMEOUT),
			refresh_policy: self.refresh_policy,
		};

		config.validate()?;

		Ok(config)
	}
}
impl TryFrom<ClientConfigBuilder> for ClientConfig {
	type Error = ClientConfigError;

	fn try_from(builder: ClientConfigBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}

impl ClientConfig {
	/// Validates invariants for the configuration.
	fn validate(&self) -> Result<(), ClientConfigError> {
		validate_scheme("refresh", &self.endpoints.refresh)?;
		validate_scheme("blacklist", &self.endpoints.blacklist)?;
		validate_scheme("login", &self.endpoints.login)?;

		if !self.login_route.starts_with('/') {
			return Err(ClientConfigError::InvalidLoginRoute { route: self.login_route.clone() });
		}
		if self.request_timeout.is_zero() {
			return Err(ClientConfigError::ZeroTimeout);
		}

		Ok(())
	}
}

fn validate_scheme(name: &'static str, url: &Url) -> Result<(), ClientConfigError> {
	match url.scheme() {
		"http" | "https" => Ok(()),
		_ => Err(ClientConfigError::UnsupportedScheme { endpoint: name, url: url.to_string() }),
	}
}

fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

fn endpoint_or_default(
	explicit: Option<Url>,
	base_url: &Url,
	origin_path: &str,
) -> Result<Url, ClientConfigError> {
	if let Some(url) = explicit {
		return Ok(url);
	}
	if !base_url.origin().is_tuple() {
		return Err(ClientConfigError::OpaqueOrigin { url: base_url.to_string() });
	}

	base_url
		.join(origin_path)
		.map_err(|_| ClientConfigError::OpaqueOrigin { url: base_url.to_string() })
}
