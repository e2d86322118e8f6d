//! Walks through a full session against a local mock back-end.
//!
//! 1. Log in and store the token pair.
//! 2. Call an endpoint whose access token has expired; the client refreshes and replays.
//! 3. Log out, which blacklists the refresh token and clears local state.
//! 4. Call the API again with a revoked refresh token and observe the expiry event.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::Value;
// self
use erp_api_client::{
	ClientConfig,
	auth::{LoginCredentials, SessionCredentials, TenantId},
	client::ReqwestApiClient,
	events::SessionEvent,
	store::MemoryStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access":"expiredA","refresh":"validR"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/").header("authorization", "Bearer expiredA");
			then.status(401).body(r#"{"code":"token_not_valid"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/").json_body(serde_json::json!({
				"refresh": "validR"
			}));
			then.status(200).header("content-type", "application/json").body(r#"{"access":"freshB"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/").json_body(serde_json::json!({
				"refresh": "staleR"
			}));
			then.status(401).body(r#"{"detail":"Token is blacklisted"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/").header("authorization", "Bearer freshB");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"count":1,"results":[{"sku":"BOLT-M8"}]}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/blacklist/");
			then.status(200).body("{}");
		})
		.await;

	let config = ClientConfig::builder(
		Url::parse(&server.url("/api/"))?,
		TenantId::new("acme-manufacturing")?,
	)
	.build()?;
	let store = MemoryStore::default();
	let client = ReqwestApiClient::new(config, Arc::new(store.clone()))?.with_listener(Arc::new(
		|event: &SessionEvent| match event {
			SessionEvent::Expired { redirect_to } => println!("Session expired; redirect to {redirect_to}."),
			SessionEvent::LoggedOut => println!("Logged out; the host would expire its cookies now."),
			SessionEvent::Refreshed => println!("Access token refreshed."),
		},
	));

	client.login(&LoginCredentials::new("planner", "hunter2")).await?;

	let products: Value = client.get("products/").await?;

	println!("Products after a transparent refresh: {products}.");
	println!("Stored access token: {:?}.", store.peek("access_token"));

	client.logout().await;

	println!("Authenticated after logout: {}.", client.is_authenticated().await?);

	client.restore_session(&SessionCredentials::new("expiredA", "staleR")).await?;

	match client.get::<Value>("products/").await {
		Ok(_) => println!("Unexpected success with a revoked refresh token."),
		Err(e) => println!("Call failed as expected: {e}"),
	}

	Ok(())
}
