//! Validated tenant identifier sent with every outgoing request.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use http::HeaderValue;
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when tenant identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Tenant identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Tenant identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier contains characters that cannot travel in an HTTP header.
	#[error("Tenant identifier contains characters that are not valid in a header value.")]
	NotHeaderSafe,
	/// The identifier exceeded the allowed character count.
	#[error("Tenant identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Fixed identifier scoping every request to one customer/organization of a multi-tenant
/// back-end.
///
/// The value is validated once at construction so it can always be encoded as the
/// `X-Tenant-ID` header without further checks.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);
impl TenantId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Returns the identifier encoded as a header value.
	pub fn header_value(&self) -> Result<HeaderValue, IdentifierError> {
		HeaderValue::from_str(&self.0).map_err(|_| IdentifierError::NotHeaderSafe)
	}
}
impl Deref for TenantId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for TenantId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for TenantId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<TenantId> for String {
	fn from(value: TenantId) -> Self {
		value.0
	}
}
impl TryFrom<String> for TenantId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Debug for TenantId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Tenant({})", self.0)
	}
}
impl Display for TenantId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for TenantId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if !view.bytes().all(|b| b.is_ascii_graphic()) {
		return Err(IdentifierError::NotHeaderSafe);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
