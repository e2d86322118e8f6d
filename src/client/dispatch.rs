//! Request dispatch: header injection, the one-shot replay after a `401`, and status handling.
//!
//! Every logical call goes through [`ApiClient::execute`]. The first attempt carries whatever
//! access token the store holds. A `401` spends the call's [`ReplayBudget`] on exactly one
//! refresh-and-replay; the replay path cannot reach the refresh coordinator again, so a second
//! `401` always reaches the caller unchanged.

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{TokenKey, TokenSecret},
	client::ApiClient,
	config::ClientConfig,
	error::{ApiError, ConfigError},
	events::SessionEvent,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, event},
	request::{ApiRequest, Payload, RequestBody, ResponseKind, decode_slice},
	transport::{ApiTransport, TransportBody, TransportRequest, TransportResponse},
};

/// Tenant header injected into every outbound request.
pub const X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");

/// Successful (2xx) response returned by [`ApiClient::execute`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Decoded body.
	pub payload: Payload,
}
impl ApiResponse {
	/// Decodes the payload into `R`.
	pub fn decode<R>(self) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.payload.decode(self.status)
	}
}

/// Permission to replay a rejected request once.
///
/// One budget is minted per logical call and consumed by the replay path; it is neither `Clone`
/// nor `Copy`, so a replayed request has nothing left to spend.
#[derive(Debug)]
#[must_use]
pub(crate) struct ReplayBudget(());
impl ReplayBudget {
	fn new() -> Self {
		Self(())
	}
}

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Sends `request`, transparently refreshing and replaying once on `401`.
	///
	/// When the session cannot be recovered (no refresh token, or the refresh call fails) the
	/// stored tokens are removed, [`SessionEvent::Expired`] is emitted, and the original `401`
	/// is returned.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let budget = ReplayBudget::new();
				let epoch = self.session_epoch();
				let stale = self.access_token().await?;
				let first = self.dispatch(&request, stale.as_ref()).await;

				match first {
					Err(e) if e.is_unauthorized() =>
						self.replay(budget, &request, (epoch, stale), e).await,
					result => result.inspect_err(log_rejection),
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Sends `request` and returns only the decoded payload.
	pub async fn send(&self, request: ApiRequest) -> Result<Payload> {
		Ok(self.execute(request).await?.payload)
	}

	async fn replay(
		&self,
		budget: ReplayBudget,
		request: &ApiRequest,
		(epoch, stale): (u64, Option<TokenSecret>),
		rejection: Error,
	) -> Result<ApiResponse> {
		let ReplayBudget(()) = budget;
		let fresh = match self.recover(stale.as_ref()).await {
			Ok(fresh) => fresh,
			// Logout or a new login took over the session; it is not ours to expire.
			Err(e) if self.session_epoch() != epoch => {
				event!(debug, error = %e, "session changed while recovering; not expiring");

				return Err(rejection);
			},
			Err(e) => {
				event!(warn, error = %e, "session could not be refreshed; expiring");

				self.expire_session().await;

				return Err(rejection);
			},
		};

		self.dispatch(request, Some(&fresh)).await.inspect_err(log_rejection)
	}

	/// Removes both tokens and tells the host to send the user to the login route.
	pub(crate) async fn expire_session(&self) {
		if let Err(e) = self.store.remove_tokens().await {
			event!(warn, error = %e, "failed to clear tokens while expiring the session");
		}

		self.listener
			.on_event(&SessionEvent::Expired { redirect_to: self.config.login_route.clone() });
	}

	pub(crate) async fn access_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.token(TokenKey::Access).await?)
	}

	async fn dispatch(
		&self,
		request: &ApiRequest,
		access: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let prepared = prepare(&self.config, request, access)?;
		let method = prepared.method.clone();
		let url = prepared.url.clone();

		event!(debug, %method, %url, authorized = access.is_some(), "dispatching request");

		let response = self.transport.execute(prepared).await?;

		interpret(method, url, request.response_kind, response)
	}
}

/// Builds the transport request for `request`.
///
/// `Content-Type` defaults to JSON (or multipart for form bodies) and yields to caller
/// overrides; `X-Tenant-ID` and `Authorization` are always set by the client.
pub(crate) fn prepare(
	config: &ClientConfig,
	request: &ApiRequest,
	access: Option<&TokenSecret>,
) -> Result<TransportRequest> {
	let mut url = config
		.resolve(&request.path)
		.map_err(|source| ConfigError::InvalidPath { path: request.path.clone(), source })?;

	if !request.query.is_empty() {
		url.query_pairs_mut().extend_pairs(&request.query);
	}

	let (body, default_content_type) = match &request.body {
		RequestBody::Empty => (TransportBody::Empty, "application/json"),
		RequestBody::Json(value) => (
			TransportBody::Bytes(serde_json::to_vec(value).map_err(ConfigError::BodySerialize)?),
			"application/json",
		),
		RequestBody::Multipart(form) =>
			(TransportBody::Multipart(form.clone()), "multipart/form-data"),
	};
	let mut headers = HeaderMap::new();

	headers.insert(CONTENT_TYPE, HeaderValue::from_static(default_content_type));
	headers.extend(request.headers.clone());
	headers.insert(X_TENANT_ID, config.tenant.header_value().map_err(ConfigError::from)?);

	match access {
		Some(token) => {
			let value = token.bearer_header().ok_or(ConfigError::InvalidBearerToken)?;

			headers.insert(AUTHORIZATION, value);
		},
		None => {
			headers.remove(AUTHORIZATION);
		},
	}

	Ok(TransportRequest {
		method: request.method.clone(),
		url,
		headers,
		body,
		timeout: Some(request.timeout.unwrap_or(config.request_timeout)),
	})
}

/// Maps a raw response onto the caller-facing result.
pub(crate) fn interpret(
	method: Method,
	url: Url,
	kind: ResponseKind,
	response: TransportResponse,
) -> Result<ApiResponse> {
	let status = response.status.as_u16();

	if !response.status.is_success() {
		let retry_after = response.retry_after();

		return Err(ApiError::from_response(method, url, status, &response.body, retry_after).into());
	}

	let TransportResponse { headers, body, .. } = response;
	let payload = match kind {
		ResponseKind::Blob => Payload::Blob(body),
		ResponseKind::Json if body.iter().all(u8::is_ascii_whitespace) => Payload::Empty,
		ResponseKind::Json => Payload::Json(decode_slice(status, &body)?),
	};

	Ok(ApiResponse { status, headers, payload })
}

fn log_rejection(e: &Error) {
	#[cfg(feature = "tracing")]
	if let Some(api) = e.as_api().filter(|api| api.is_forbidden()) {
		::tracing::warn!(
			method = %api.method,
			url = %api.url,
			"request forbidden for the current session"
		);
	}
	#[cfg(not(feature = "tracing"))]
	let _ = e;
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::{StatusCode, header::ACCEPT};
	// self
	use super::*;
	use crate::{
		auth::TenantId,
		client::testing::{ScriptedTransport, client_with, json_response},
		request::MultipartForm,
	};

	fn config() -> ClientConfig {
		ClientConfig::builder(
			Url::parse("https://erp.example.com/api/").expect("Base URL fixture should parse."),
			TenantId::new("acme").expect("Tenant fixture should be valid."),
		)
		.build()
		.expect("Configuration fixture should be valid.")
	}

	#[test]
	fn prepare_injects_default_tenant_and_bearer_headers() {
		let request = ApiRequest::get("/products/").query("search", "bolt m8");
		let prepared = prepare(&config(), &request, Some(&TokenSecret::new("expiredA")))
			.expect("Request should prepare.");

		assert_eq!(prepared.url.as_str(), "https://erp.example.com/api/products/?search=bolt+m8");
		assert_eq!(prepared.headers[CONTENT_TYPE], "application/json");
		assert_eq!(prepared.headers[X_TENANT_ID], "acme");
		assert_eq!(prepared.headers[AUTHORIZATION], "Bearer expiredA");
		assert_eq!(prepared.timeout, Some(ClientConfig::DEFAULT_TIMEOUT));
	}

	#[test]
	fn prepare_omits_authorization_without_a_token() {
		let request = ApiRequest::get("products/")
			.header(AUTHORIZATION, HeaderValue::from_static("Bearer spoofed"));
		let prepared = prepare(&config(), &request, None).expect("Request should prepare.");

		assert!(prepared.headers.get(AUTHORIZATION).is_none());
		assert_eq!(prepared.headers[X_TENANT_ID], "acme");
	}

	#[tokio::test]
	async fn paths_outside_the_base_url_never_carry_the_token() {
		let transport = ScriptedTransport::new(|request| {
			panic!("No request should be sent, got {} {}.", request.method, request.url)
		});
		let (client, store, _) = client_with(transport.clone(), Some(("secretA", Some("validR"))));

		for path in ["https://evil.example/collect", "../../admin/"] {
			let err = client
				.get::<JsonValue>(path)
				.await
				.expect_err("Escaping paths should be rejected before dispatch.");

			assert!(matches!(
				err,
				Error::Config(ConfigError::InvalidPath { path: ref rejected, .. }) if rejected == path
			));
		}

		assert!(transport.requests().is_empty());
		assert_eq!(store.peek("access_token"), Some("secretA".into()));
	}

	#[test]
	fn caller_overrides_content_type_but_not_tenant() {
		let request = ApiRequest::post("reports/")
			.header(CONTENT_TYPE, HeaderValue::from_static("text/csv"))
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.header(X_TENANT_ID, HeaderValue::from_static("someone-else"));
		let prepared = prepare(&config(), &request, None).expect("Request should prepare.");

		assert_eq!(prepared.headers[CONTENT_TYPE], "text/csv");
		assert_eq!(prepared.headers[ACCEPT], "application/json");
		assert_eq!(prepared.headers[X_TENANT_ID], "acme");
	}

	#[test]
	fn multipart_bodies_default_to_form_data() {
		let form = MultipartForm::new().text("sku", "BOLT-M8").file(
			"image",
			"bolt.png",
			Some("image/png"),
			vec![0x89, 0x50],
		);
		let prepared =
			prepare(&config(), &ApiRequest::post("products/upload/").multipart(form), None)
				.expect("Request should prepare.");

		assert_eq!(prepared.headers[CONTENT_TYPE], "multipart/form-data");
		assert!(matches!(prepared.body, TransportBody::Multipart(ref form) if form.parts().len() == 2));
	}

	#[test]
	fn interpret_handles_empty_blob_and_error_bodies() {
		let url = Url::parse("https://erp.example.com/api/orders/7/").expect("URL should parse.");
		let empty = interpret(
			Method::DELETE,
			url.clone(),
			ResponseKind::Json,
			TransportResponse::new(StatusCode::NO_CONTENT, Vec::new()),
		)
		.expect("204 responses should succeed.");

		assert_eq!(empty.payload, Payload::Empty);

		let blob = interpret(
			Method::GET,
			url.clone(),
			ResponseKind::Blob,
			TransportResponse::new(StatusCode::OK, b"PK\x03\x04".to_vec()),
		)
		.expect("Blob responses should succeed.");

		assert_eq!(blob.payload, Payload::Blob(b"PK\x03\x04".to_vec()));

		let err = interpret(
			Method::GET,
			url,
			ResponseKind::Json,
			TransportResponse::new(StatusCode::BAD_REQUEST, br#"{"detail":"Bad filter."}"#.to_vec()),
		)
		.expect_err("400 responses should fail.");

		assert_eq!(err.as_api().and_then(ApiError::detail), Some("Bad filter."));
	}

	#[tokio::test]
	async fn forbidden_responses_leave_the_session_alone() {
		let transport = ScriptedTransport::new(|_| Ok(TransportResponse::new(StatusCode::FORBIDDEN, Vec::new())));
		let (client, store, listener) = client_with(transport.clone(), Some(("expiredA", Some("validR"))));
		let err = client
			.get::<JsonValue>("settings/")
			.await
			.expect_err("403 responses should reach the caller.");

		assert!(err.is_forbidden());
		assert_eq!(transport.requests().len(), 1);
		assert_eq!(store.peek("access_token"), Some("expiredA".into()));
		assert_eq!(store.peek("refresh_token"), Some("validR".into()));
		assert!(listener.events().is_empty());
		assert_eq!(client.refresh_metrics.attempts(), 0);
	}

	#[tokio::test]
	async fn other_failures_propagate_without_refreshing() {
		let transport = ScriptedTransport::new(|_| {
			Ok(TransportResponse::new(StatusCode::INTERNAL_SERVER_ERROR, b"boom".to_vec()))
		});
		let (client, _, listener) = client_with(transport.clone(), Some(("expiredA", Some("validR"))));
		let err = client.delete("orders/7/").await.expect_err("500 responses should reach the caller.");

		assert_eq!(err.status(), Some(500));
		assert_eq!(transport.requests().len(), 1);
		assert!(listener.events().is_empty());
	}

	fn bearer(request: &TransportRequest) -> Option<&str> {
		request.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	#[tokio::test]
	async fn expired_access_token_is_refreshed_and_replayed() {
		let transport = ScriptedTransport::new(|request| match request.url.path() {
			"/api/token/refresh/" => Ok(json_response(StatusCode::OK, r#"{"access":"freshB"}"#)),
			"/api/products/" if bearer(request) == Some("Bearer freshB") =>
				Ok(json_response(StatusCode::OK, r#"{"results":[{"sku":"BOLT-M8"}]}"#)),
			_ => Ok(json_response(StatusCode::UNAUTHORIZED, r#"{"code":"token_not_valid"}"#)),
		});
		let (client, store, listener) =
			client_with(transport.clone(), Some(("expiredA", Some("validR"))));
		let body: JsonValue = client.get("products/").await.expect("Replay should succeed.");

		assert_eq!(body, serde_json::json!({ "results": [{ "sku": "BOLT-M8" }] }));
		assert_eq!(store.peek("access_token"), Some("freshB".into()));

		let sent = transport.requests();
		let trail = sent.iter().map(|r| (r.url.path(), bearer(r))).collect::<Vec<_>>();

		assert_eq!(trail, vec![
			("/api/products/", Some("Bearer expiredA")),
			("/api/token/refresh/", None),
			("/api/products/", Some("Bearer freshB")),
		]);
		assert_eq!(listener.events(), vec![SessionEvent::Refreshed]);
	}

	#[tokio::test]
	async fn replayed_unauthorized_is_returned_without_another_refresh() {
		let transport = ScriptedTransport::new(|request| match request.url.path() {
			"/api/token/refresh/" => Ok(json_response(StatusCode::OK, r#"{"access":"freshB"}"#)),
			_ => Ok(json_response(StatusCode::UNAUTHORIZED, "{}")),
		});
		let (client, store, listener) =
			client_with(transport.clone(), Some(("expiredA", Some("validR"))));
		let err = client
			.get::<JsonValue>("products/")
			.await
			.expect_err("The replayed 401 should reach the caller.");

		assert!(err.is_unauthorized());
		assert_eq!(transport.requests().len(), 3);
		assert_eq!(client.refresh_metrics.attempts(), 1);
		assert_eq!(store.peek("access_token"), Some("freshB".into()));
		assert_eq!(listener.events(), vec![SessionEvent::Refreshed]);
	}

	#[tokio::test]
	async fn failed_refresh_expires_the_session_and_returns_the_original_rejection() {
		let transport = ScriptedTransport::new(|request| match request.url.path() {
			"/api/token/refresh/" =>
				Ok(json_response(StatusCode::UNAUTHORIZED, r#"{"detail":"Token is invalid"}"#)),
			_ => Ok(json_response(StatusCode::UNAUTHORIZED, r#"{"detail":"Access expired"}"#)),
		});
		let (client, store, listener) =
			client_with(transport.clone(), Some(("expiredA", Some("staleR"))));
		let err = client
			.get::<JsonValue>("products/")
			.await
			.expect_err("The original 401 should reach the caller.");
		let api = err.as_api().expect("The original rejection should be an API error.");

		assert_eq!(api.url.path(), "/api/products/");
		assert_eq!(api.detail(), Some("Access expired"));
		assert!(store.is_empty());
		assert_eq!(listener.events(), vec![SessionEvent::Expired { redirect_to: "/login".into() }]);
		assert_eq!(transport.requests().len(), 2);
	}

	#[tokio::test]
	async fn missing_refresh_token_expires_without_calling_the_network() {
		let transport =
			ScriptedTransport::new(|_| Ok(json_response(StatusCode::UNAUTHORIZED, "{}")));
		let (client, store, listener) = client_with(transport.clone(), Some(("expiredA", None)));
		let err = client
			.get::<JsonValue>("products/")
			.await
			.expect_err("The original 401 should reach the caller.");

		assert!(err.is_unauthorized());
		assert_eq!(transport.requests().len(), 1);
		assert!(store.is_empty());
		assert_eq!(listener.events(), vec![SessionEvent::Expired { redirect_to: "/login".into() }]);
	}
}
