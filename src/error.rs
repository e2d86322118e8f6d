//! Client-level error types shared across the dispatcher, refresh coordinator, and stores.

// crates.io
use http::Method;
// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The server answered with a non-2xx status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// No response was received (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The session was ended or replaced while a token refresh was in flight.
	#[error("Session ended while the access token was being refreshed.")]
	SessionEnded,

	/// A successful response carried a body that could not be decoded.
	#[error("Response from HTTP {status} could not be decoded.")]
	Decode {
		/// HTTP status of the response.
		status: u16,
		/// Structured parsing failure, including the failing field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status code carried by the error, when a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(e) => Some(e.status),
			Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns the API error when the server answered with a non-2xx status.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(e) => Some(e),
			_ => None,
		}
	}

	/// Returns `true` for `401 Unauthorized` responses.
	pub fn is_unauthorized(&self) -> bool {
		self.as_api().is_some_and(ApiError::is_unauthorized)
	}

	/// Returns `true` for `403 Forbidden` responses.
	pub fn is_forbidden(&self) -> bool {
		self.as_api().is_some_and(ApiError::is_forbidden)
	}
}

/// Non-2xx response surfaced to the caller with whatever the server sent back.
#[derive(Clone, Debug, ThisError)]
#[error("{method} {url} failed with HTTP {status}.")]
pub struct ApiError {
	/// Request method.
	pub method: Method,
	/// Fully resolved request URL.
	pub url: Url,
	/// HTTP status code.
	pub status: u16,
	/// Server-provided JSON error payload, if the body parsed as JSON.
	pub payload: Option<JsonValue>,
	/// Leading bytes of a non-JSON body, decoded lossily.
	pub body_preview: Option<String>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl ApiError {
	const BODY_PREVIEW_LEN: usize = 256;

	pub(crate) fn from_response(
		method: Method,
		url: Url,
		status: u16,
		body: &[u8],
		retry_after: Option<Duration>,
	) -> Self {
		let payload = if body.is_empty() { None } else { serde_json::from_slice(body).ok() };
		let body_preview = match payload {
			Some(_) => None,
			None if body.is_empty() => None,
			None => {
				let end = body.len().min(Self::BODY_PREVIEW_LEN);

				Some(String::from_utf8_lossy(&body[..end]).into_owned())
			},
		};

		Self { method, url, status, payload, body_preview, retry_after }
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Returns `true` for `403 Forbidden` (authenticated but not authorized).
	pub fn is_forbidden(&self) -> bool {
		self.status == 403
	}

	/// Returns `true` for 5xx responses.
	pub fn is_server_error(&self) -> bool {
		(500..600).contains(&self.status)
	}

	/// Returns the `detail` string many REST back-ends put in their error payloads.
	pub fn detail(&self) -> Option<&str> {
		self.payload.as_ref()?.get("detail")?.as_str()
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Client configuration failed validation.
	#[error(transparent)]
	InvalidConfig(#[from] crate::config::ClientConfigError),
	/// A request path could not be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending relative path.
		path: String,
		/// Why the path was rejected.
		#[source]
		source: crate::config::PathError,
	},
	/// The stored access token cannot be encoded as an `Authorization` header.
	#[error("Stored access token cannot be encoded as an Authorization header.")]
	InvalidBearerToken,
	/// A refresh was required but no refresh token is stored.
	#[error("Session store holds no refresh token.")]
	MissingRefreshToken,
	/// The tenant identifier cannot be encoded as a header.
	#[error(transparent)]
	InvalidTenant(#[from] crate::auth::IdentifierError),
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized to JSON.")]
	BodySerialize(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures where no response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete before its timeout elapsed.
	#[error("Request timed out before the API responded.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// The transport could not encode the request (e.g. an invalid multipart MIME type).
	#[error("Request could not be encoded by the transport.")]
	InvalidRequest {
		/// Transport-specific encoding error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}

	/// Wraps a transport-specific request encoding error.
	pub fn invalid_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::InvalidRequest { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::timeout(e)
		} else if e.is_builder() {
			Self::invalid_request(e)
		} else {
			Self::network(e)
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
