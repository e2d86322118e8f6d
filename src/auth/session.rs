//! Session credential models and the storage keys they live under.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Storage keys holding the session tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKey {
	/// Short-lived bearer credential sent on every authenticated request.
	Access,
	/// Longer-lived credential exchanged for new access tokens.
	Refresh,
}
impl TokenKey {
	/// Both keys, in teardown order.
	pub const ALL: [TokenKey; 2] = [TokenKey::Access, TokenKey::Refresh];

	/// Returns the persisted key name.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKey::Access => "access_token",
			TokenKey::Refresh => "refresh_token",
		}
	}
}
impl Display for TokenKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Opaque bearer tokens making up an authenticated session.
///
/// The client never parses either token; they are stored and replayed verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
	/// Current access token.
	pub access_token: TokenSecret,
	/// Refresh token, when the back-end issued one.
	pub refresh_token: Option<TokenSecret>,
}
impl SessionCredentials {
	/// Creates a session from an access/refresh token pair.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: Some(refresh_token.into()) }
	}

	/// Creates a session that cannot be refreshed.
	pub fn access_only(access_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: None }
	}
}

/// Username/password pair exchanged for a session at the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
	/// Account name.
	pub username: String,
	/// Account password.
	pub password: TokenSecret,
}
impl LoginCredentials {
	/// Creates login credentials.
	pub fn new(username: impl Into<String>, password: impl Into<TokenSecret>) -> Self {
		Self { username: username.into(), password: password.into() }
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Token pair returned by the login endpoint.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct TokenPairResponse {
	pub(crate) access: TokenSecret,
	pub(crate) refresh: TokenSecret,
}

/// Payload returned by the refresh endpoint; `refresh` is present when the back-end rotates.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RefreshResponse {
	pub(crate) access: TokenSecret,
	#[serde(default)]
	pub(crate) refresh: Option<TokenSecret>,
}

/// Body shared by the refresh and blacklist endpoints.
#[derive(Serialize)]
pub(crate) struct RefreshTokenBody<'a> {
	pub(crate) refresh: &'a str,
}
