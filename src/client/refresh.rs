//! Access-token refresh with an optional single-flight guard.
//!
//! [`ApiClient::refresh_access_token`] exchanges the stored refresh token for a new access token
//! and persists it (plus a rotated refresh token, when the back-end sends one). Under
//! [`RefreshPolicy::Coalesce`] refreshes run one at a time: a request that waited on the guard
//! and finds the stored access token already differs from the one it was rejected with reuses
//! that token instead of calling the refresh endpoint again. [`RefreshPolicy::Independent`]
//! lets every rejected request refresh on its own and the last stored token wins.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use http::{
	HeaderMap, HeaderValue, Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{RefreshResponse, RefreshTokenBody, TokenKey, TokenSecret},
	client::{ApiClient, ApiResponse, X_TENANT_ID, dispatch},
	config::RefreshPolicy,
	error::ConfigError,
	events::SessionEvent,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, event},
	request::ResponseKind,
	transport::{ApiTransport, TransportBody, TransportRequest},
};

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Exchanges the stored refresh token for a new access token and stores it.
	///
	/// Fails with [`ConfigError::MissingRefreshToken`] without touching the network when no
	/// refresh token is stored. A failed refresh leaves the store untouched; deciding whether
	/// the session is over is up to the caller. A token that arrives after the session was
	/// logged out or replaced is discarded with [`Error::SessionEnded`].
	pub async fn refresh_access_token(&self) -> Result<TokenSecret> {
		match self.config.refresh_policy {
			RefreshPolicy::Coalesce => {
				let _singleflight = self.refresh_guard.lock().await;

				self.perform_refresh().await
			},
			RefreshPolicy::Independent => self.perform_refresh().await,
		}
	}

	/// Returns the counters tracking refresh outcomes.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Produces the token a rejected request should be replayed with.
	pub(crate) async fn recover(&self, stale: Option<&TokenSecret>) -> Result<TokenSecret> {
		if self.config.refresh_policy == RefreshPolicy::Independent {
			return self.perform_refresh().await;
		}

		let _singleflight = self.refresh_guard.lock().await;

		match self.access_token().await? {
			Some(current) if Some(&current) != stale => {
				self.refresh_metrics.record_coalesced();

				event!(debug, "reusing an access token refreshed by a concurrent request");

				Ok(current)
			},
			_ => self.perform_refresh().await,
		}
	}

	async fn perform_refresh(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async {
				let epoch = self.session_epoch();
				let refresh = self
					.store
					.token(TokenKey::Refresh)
					.await?
					.ok_or(ConfigError::MissingRefreshToken)?;
				let response: RefreshResponse = self
					.call_auth_endpoint(
						&self.config.endpoints.refresh,
						&RefreshTokenBody { refresh: refresh.expose() },
						None,
					)
					.await?
					.decode()?;

				// Under `Coalesce` the caller already holds the guard.
				let _commit = match self.config.refresh_policy {
					RefreshPolicy::Coalesce => None,
					RefreshPolicy::Independent => Some(self.refresh_guard.lock().await),
				};

				if self.session_epoch() != epoch {
					return Err(Error::SessionEnded);
				}

				self.store.set_token(TokenKey::Access, &response.access).await?;

				if let Some(rotated) = &response.refresh {
					self.store.set_token(TokenKey::Refresh, rotated).await?;
				}

				Ok(response.access)
			})
			.await;

		match &result {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				event!(info, "access token refreshed");
				self.listener.on_event(&SessionEvent::Refreshed);
			},
			Err(e) => {
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				event!(warn, error = %e, "access token refresh failed");
			},
		}

		result
	}

	/// Posts a JSON body straight to one of the token endpoints.
	///
	/// These calls never go through the refresh coordinator, so a `401` from the refresh
	/// endpoint itself cannot trigger another refresh.
	pub(crate) async fn call_auth_endpoint<B>(
		&self,
		url: &Url,
		body: &B,
		bearer: Option<&TokenSecret>,
	) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(X_TENANT_ID, self.config.tenant.header_value().map_err(ConfigError::from)?);

		if let Some(token) = bearer {
			headers.insert(
				AUTHORIZATION,
				token.bearer_header().ok_or(ConfigError::InvalidBearerToken)?,
			);
		}

		let request = TransportRequest {
			method: Method::POST,
			url: url.clone(),
			headers,
			body: TransportBody::Bytes(
				serde_json::to_vec(body).map_err(ConfigError::BodySerialize)?,
			),
			timeout: Some(self.config.request_timeout),
		};
		let response = self.transport.execute(request).await?;

		dispatch::interpret(Method::POST, url.clone(), ResponseKind::Json, response)
	}
}
