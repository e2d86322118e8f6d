//! Client configuration: base URL, tenant, auth endpoints, and request defaults.
//!
//! Hosts either assemble a [`ClientConfig`] with [`ClientConfig::builder`] or deserialize one
//! from their own configuration files; both paths run the same validation.

/// Builder API for assembling client configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::TenantId};

/// How concurrent `401` responses share token refreshes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
	/// Serialize refreshes behind one guard; requests that waited on a refresh another request
	/// already completed reuse its token instead of calling the refresh endpoint again.
	#[default]
	Coalesce,
	/// Every rejected request refreshes on its own; the last stored token wins.
	Independent,
}

/// Authentication endpoints consumed by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Exchanges `{ refresh }` for `{ access }`.
	pub refresh: Url,
	/// Revokes a refresh token during logout.
	pub blacklist: Url,
	/// Exchanges `{ username, password }` for `{ access, refresh }`.
	pub login: Url,
}

/// Immutable configuration consumed by [`ApiClient`](crate::ApiClient).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ClientConfigBuilder")]
pub struct ClientConfig {
	/// Base URL that every relative request path is resolved against; always ends with `/`.
	pub base_url: Url,
	/// Tenant identifier sent as `X-Tenant-ID` on every request.
	pub tenant: TenantId,
	/// Token endpoints.
	pub endpoints: AuthEndpoints,
	/// Route the host should navigate to once a session can no longer be recovered.
	pub login_route: String,
	/// Default deadline applied to every request.
	pub request_timeout: StdDuration,
	/// Concurrent refresh behavior.
	pub refresh_policy: RefreshPolicy,
}
impl ClientConfig {
	/// Default request deadline.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
	/// Default login route.
	pub const DEFAULT_LOGIN_ROUTE: &'static str = "/login";
	/// Refresh endpoint path relative to the origin.
	pub const REFRESH_PATH: &'static str = "/api/token/refresh/";
	/// Blacklist endpoint path relative to the origin.
	pub const BLACKLIST_PATH: &'static str = "/api/token/blacklist/";
	/// Login endpoint path relative to the origin.
	pub const LOGIN_PATH: &'static str = "/api/token/";

	/// Creates a new builder for the provided base URL and tenant.
	pub fn builder(base_url: Url, tenant: TenantId) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url, tenant)
	}

	/// Resolves a request path against the base URL.
	///
	/// Leading slashes are stripped. Absolute URLs and paths whose dot segments climb out of
	/// the base URL are rejected, so bearer tokens only ever reach the configured API.
	pub fn resolve(&self, path: &str) -> Result<Url, PathError> {
		let relative = path.trim_start_matches('/');

		if Url::parse(relative).is_ok() {
			return Err(PathError::Absolute);
		}

		let url = self.base_url.join(relative)?;

		if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path())
		{
			return Err(PathError::OutsideBase { resolved: url.to_string() });
		}

		Ok(url)
	}
}

/// Reasons a request path cannot be resolved against the base URL.
#[derive(Debug, ThisError)]
pub enum PathError {
	/// The path is not a valid relative reference.
	#[error(transparent)]
	Parse(#[from] url::ParseError),
	/// The path is an absolute URL.
	#[error("Absolute URLs are not accepted as request paths.")]
	Absolute,
	/// The path resolves outside the base URL.
	#[error("Path resolves outside the base URL: {resolved}.")]
	OutsideBase {
		/// URL the path resolved to.
		resolved: String,
	},
}
