//! Transport primitives for API calls.
//!
//! [`ApiTransport`] is the client's only dependency on an HTTP stack. The dispatcher hands it a
//! fully prepared [`TransportRequest`] (absolute URL, final headers, encoded body, timeout) and
//! receives the raw status, headers, and body bytes back; status interpretation, token refresh,
//! and error shaping all stay inside the client so custom transports only move bytes.

// crates.io
use http::{HeaderMap, Method, StatusCode, header::RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError, request::MultipartForm};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing prepared API requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// clone of a client, and the futures they return must be `Send` so callers can spawn them on
/// multi-threaded executors. Any HTTP status, including `401` and `5xx`, is a successful
/// transport outcome; only failures to obtain a response belong in [`TransportError`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the raw response.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// Fully prepared request handed to an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL, query string included.
	pub url: Url,
	/// Final header set; the dispatcher already applied defaults, overrides, and auth.
	pub headers: HeaderMap,
	/// Encoded request body.
	pub body: TransportBody,
	/// Deadline for the whole exchange.
	pub timeout: Option<StdDuration>,
}

/// Encoded request body.
#[derive(Clone, Debug, Default)]
pub enum TransportBody {
	/// No body.
	#[default]
	Empty,
	/// Raw bytes (already-serialized JSON).
	Bytes(Vec<u8>),
	/// Multipart form; the transport owns boundary generation and the final `Content-Type`.
	Multipart(MultipartForm),
}

/// Raw response returned by an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Creates a response with an empty header map.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Parses the `Retry-After` header, if present.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are followed with reqwest's default policy. Timeouts are applied per request from
/// [`TransportRequest::timeout`], so a custom [`ReqwestClient`] does not need its own.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport identifying itself with this crate's user agent.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.user_agent(concat!("erp-api-client/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self(client))
	}

	fn multipart(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
		// crates.io
		use reqwest::multipart::{Form, Part};
		// self
		use crate::request::FormPart;

		let mut out = Form::new();

		for part in form.into_parts() {
			out = match part {
				FormPart::Text { name, value } => out.text(name, value),
				FormPart::File { name, file_name, content_type, bytes } => {
					let mut file = Part::bytes(bytes).file_name(file_name);

					if let Some(mime) = content_type {
						file = file.mime_str(&mime).map_err(TransportError::invalid_request)?;
					}

					out.part(name, file)
				},
			};
		}

		Ok(out)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let TransportRequest { method, url, mut headers, body, timeout } = request;
			let mut builder = self.0.request(method, url);

			builder = match body {
				TransportBody::Empty => builder.headers(headers),
				TransportBody::Bytes(bytes) => builder.headers(headers).body(bytes),
				TransportBody::Multipart(form) => {
					// The boundary-bearing value is set by reqwest.
					headers.remove(http::header::CONTENT_TYPE);

					builder.headers(headers).multipart(Self::multipart(form)?)
				},
			};

			if let Some(timeout) = timeout {
				builder = builder.timeout(timeout);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(TransportResponse { status, headers, body })
		})
	}
}

/// Parses a `Retry-After` header expressed either in seconds or as an RFC 2822 date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
