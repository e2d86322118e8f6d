//! Session lifecycle: login, restore, inspection, and best-effort teardown.

// self
use crate::{
	_prelude::*,
	auth::{LoginCredentials, RefreshTokenBody, SessionCredentials, TokenKey, TokenPairResponse},
	client::ApiClient,
	events::SessionEvent,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, event},
	transport::ApiTransport,
};

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Exchanges a username and password for a token pair and stores both tokens.
	///
	/// Failures leave the store untouched.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<SessionCredentials> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let pair: TokenPairResponse = self
					.call_auth_endpoint(&self.config.endpoints.login, credentials, None)
					.await?
					.decode()?;
				let session = SessionCredentials::new(pair.access, pair.refresh);

				self.restore_session(&session).await?;

				Ok(session)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Stores tokens obtained elsewhere (a previous run, an SSO hand-off).
	///
	/// A credential without a refresh token removes any stale one, so the next `401` expires
	/// the session instead of refreshing with a token from another login.
	///
	/// Refreshes still in flight for the previous session are discarded.
	pub async fn restore_session(&self, credentials: &SessionCredentials) -> Result<()> {
		let _singleflight = self.refresh_guard.lock().await;

		self.advance_session_epoch();
		self.store.set_token(TokenKey::Access, &credentials.access_token).await?;

		match &credentials.refresh_token {
			Some(refresh) => self.store.set_token(TokenKey::Refresh, refresh).await?,
			None => self.store.remove(TokenKey::Refresh.as_str()).await?,
		}

		Ok(())
	}

	/// Returns the stored tokens, if an access token is present.
	pub async fn session(&self) -> Result<Option<SessionCredentials>> {
		let Some(access_token) = self.access_token().await? else {
			return Ok(None);
		};
		let refresh_token = self.store.token(TokenKey::Refresh).await?;

		Ok(Some(SessionCredentials { access_token, refresh_token }))
	}

	/// Returns `true` when an access token is stored. The token may still be expired.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.access_token().await?.is_some())
	}

	/// Ends the session remotely (best effort) and locally (always).
	///
	/// When a refresh token is stored it is posted to the blacklist endpoint; any failure of
	/// that call is logged and ignored. Both tokens are then removed, session-scoped storage is
	/// cleared, and [`SessionEvent::LoggedOut`] is emitted so the host can expire its cookies.
	/// Local cleanup failures are logged as well; logout never fails. Refreshes in flight when
	/// logout starts are discarded instead of storing their token.
	pub async fn logout(&self) {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let clean = span
			.instrument(async {
				let mut clean = true;

				self.advance_session_epoch();

				match self.store.token(TokenKey::Refresh).await {
					Ok(Some(refresh)) => {
						let access = self.access_token().await.ok().flatten();

						if let Err(e) = self
							.call_auth_endpoint(
								&self.config.endpoints.blacklist,
								&RefreshTokenBody { refresh: refresh.expose() },
								access.as_ref(),
							)
							.await
						{
							event!(warn, error = %e, "refresh token could not be blacklisted");

							clean = false;
						}
					},
					Ok(None) => {},
					Err(e) => {
						event!(warn, error = %e, "refresh token could not be read before logout");

						clean = false;
					},
				}

				{
					let _singleflight = self.refresh_guard.lock().await;

					if let Err(e) = self.store.remove_tokens().await {
						event!(warn, error = %e, "failed to remove session tokens");

						clean = false;
					}

					// Refreshes that started while the blacklist call ran must not commit either.
					self.advance_session_epoch();
				}

				let storage_cleared = match &self.session_storage {
					Some(storage) => storage.clear().await,
					None => Ok(()),
				};

				if let Err(e) = storage_cleared {
					event!(warn, error = %e, "failed to clear session storage");

					clean = false;
				}

				self.listener.on_event(&SessionEvent::LoggedOut);

				clean
			})
			.await;

		obs::record_flow_outcome(
			KIND,
			if clean { FlowOutcome::Success } else { FlowOutcome::Failure },
		);
	}
}
