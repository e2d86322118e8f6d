//! Outgoing request descriptors and decoded response payloads.

pub mod multipart;

pub use multipart::*;

// crates.io
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// How a successful response body is handed back to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseKind {
	/// Parse the body as JSON.
	#[default]
	Json,
	/// Return the raw bytes (file exports, PDFs, spreadsheets).
	Blob,
}

/// Body attached to an [`ApiRequest`].
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// JSON document, sent with `Content-Type: application/json`.
	Json(JsonValue),
	/// Multipart upload, sent with `Content-Type: multipart/form-data`.
	Multipart(MultipartForm),
}

/// Transient description of one logical API call.
///
/// A descriptor is never mutated by the client: replays after a token refresh re-read it and
/// only the injected `Authorization` header differs between attempts.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL.
	pub path: String,
	/// Query pairs appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Header overrides applied on top of the defaults.
	pub headers: HeaderMap,
	/// Request body.
	pub body: RequestBody,
	/// Expected response representation.
	pub response_kind: ResponseKind,
	/// Per-request deadline overriding the client default.
	pub timeout: Option<StdDuration>,
}
impl ApiRequest {
	/// Creates a descriptor for `method` and a path relative to the base URL.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: RequestBody::Empty,
			response_kind: ResponseKind::Json,
			timeout: None,
		}
	}

	/// `GET` descriptor.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` descriptor.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT` descriptor.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `PATCH` descriptor.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// `DELETE` descriptor.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Overrides a header. `X-Tenant-ID` and `Authorization` are always set by the client.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Attaches a JSON body.
	pub fn json(mut self, body: JsonValue) -> Self {
		self.body = RequestBody::Json(body);

		self
	}

	/// Serializes `body` and attaches it as JSON.
	pub fn json_from<B>(self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let value =
			serde_json::to_value(body).map_err(crate::error::ConfigError::BodySerialize)?;

		Ok(self.json(value))
	}

	/// Attaches a multipart body.
	pub fn multipart(mut self, form: MultipartForm) -> Self {
		self.body = RequestBody::Multipart(form);

		self
	}

	/// Requests the raw response bytes instead of JSON.
	pub fn blob(mut self) -> Self {
		self.response_kind = ResponseKind::Blob;

		self
	}

	/// Overrides the client's default deadline for this request.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// Successful response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
	/// Parsed JSON document.
	Json(JsonValue),
	/// Raw bytes returned in [`ResponseKind::Blob`] mode.
	Blob(Vec<u8>),
	/// The server sent no body (e.g. `204 No Content`).
	Empty,
}
impl Payload {
	/// Returns the JSON document, if any.
	pub fn as_json(&self) -> Option<&JsonValue> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Consumes the payload, returning raw bytes for blobs and re-encoded JSON otherwise.
	pub fn into_bytes(self) -> Vec<u8> {
		match self {
			Self::Blob(bytes) => bytes,
			Self::Json(value) => value.to_string().into_bytes(),
			Self::Empty => Vec::new(),
		}
	}

	/// Decodes the payload into `T`; an empty payload decodes as JSON `null`.
	pub fn decode<T>(self, status: u16) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let value = match self {
			Self::Json(value) => value,
			Self::Empty => JsonValue::Null,
			Self::Blob(bytes) => return decode_slice(status, &bytes),
		};

		serde_path_to_error::deserialize(value).map_err(|source| Error::Decode { status, source })
	}
}

/// Decodes a JSON body with field-path aware errors.
pub(crate) fn decode_slice<T>(status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { status, source })
}
