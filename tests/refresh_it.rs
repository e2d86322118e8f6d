#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use common::*;
use erp_api_client::{RefreshPolicy, events::SessionEvent};

const PRODUCTS: &str = r#"{"count":2,"results":[{"sku":"BOLT-M8"},{"sku":"NUT-M8"}]}"#;

#[tokio::test]
async fn expired_access_token_is_refreshed_and_the_request_replayed() {
	let server = MockServer::start_async().await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/").header("authorization", "Bearer expiredA");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"code":"token_not_valid"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/token/refresh/")
				.header("x-tenant-id", TENANT)
				.json_body(json!({ "refresh": "validR" }));
			then.status(200).header("content-type", "application/json").body(r#"{"access":"freshB"}"#);
		})
		.await;
	let replayed = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/").header("authorization", "Bearer freshB");
			then.status(200).header("content-type", "application/json").body(PRODUCTS);
		})
		.await;
	let (client, store, listener) = client_for(&server, Some("expiredA"), Some("validR"));
	let page: Value = client.get("products/").await.expect("The replayed request should succeed.");

	rejected.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	replayed.assert_calls_async(1).await;

	assert_eq!(page["results"][0]["sku"], "BOLT-M8");
	assert_eq!(store.peek("access_token"), Some("freshB".into()));
	assert_eq!(store.peek("refresh_token"), Some("validR".into()));
	assert_eq!(listener.events(), vec![SessionEvent::Refreshed]);
}

#[tokio::test]
async fn a_second_unauthorized_propagates_without_another_refresh() {
	let server = MockServer::start_async().await;
	let products = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/");
			then.status(401).header("content-type", "application/json").body("{}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/");
			then.status(200).header("content-type", "application/json").body(r#"{"access":"freshB"}"#);
		})
		.await;
	let (client, store, listener) = client_for(&server, Some("expiredA"), Some("validR"));
	let err = client
		.get::<Value>("products/")
		.await
		.expect_err("The replayed 401 should reach the caller.");

	products.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;

	assert!(err.is_unauthorized());
	assert_eq!(store.peek("access_token"), Some("freshB".into()));
	assert!(!listener.events().contains(&SessionEvent::Expired { redirect_to: "/login".into() }));
}

#[tokio::test]
async fn missing_refresh_token_expires_the_session_without_a_refresh_call() {
	let server = MockServer::start_async().await;
	let products = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/");
			then.status(401).header("content-type", "application/json").body("{}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/");
			then.status(200).header("content-type", "application/json").body(r#"{"access":"x"}"#);
		})
		.await;
	let (client, store, listener) = client_for(&server, Some("expiredA"), None);
	let err = client.get::<Value>("products/").await.expect_err("The 401 should reach the caller.");

	products.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert!(err.is_unauthorized());
	assert!(store.is_empty());
	assert_eq!(listener.events(), vec![SessionEvent::Expired { redirect_to: "/login".into() }]);
}

#[tokio::test]
async fn rejected_refresh_clears_tokens_and_returns_the_original_error() {
	let server = MockServer::start_async().await;
	let products = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"detail":"Given token not valid for any token type"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/").json_body(json!({ "refresh": "staleR" }));
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"detail":"Token is blacklisted"}"#);
		})
		.await;
	let config = config_builder(&server)
		.login_route("/auth/sign-in")
		.build()
		.expect("Configuration should be valid.");
	let (client, store, listener) =
		build_client(config, seeded_store(Some("expiredA"), Some("staleR")));
	let err = client.get::<Value>("products/").await.expect_err("The 401 should reach the caller.");

	products.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	let api = err.as_api().expect("The original rejection should be an API error.");

	assert_eq!(api.url.path(), "/api/products/");
	assert_eq!(api.detail(), Some("Given token not valid for any token type"));
	assert!(store.peek("access_token").is_none());
	assert!(store.peek("refresh_token").is_none());
	assert_eq!(listener.events(), vec![SessionEvent::Expired {
		redirect_to: "/auth/sign-in".into()
	}]);
}

#[tokio::test]
async fn rotated_refresh_tokens_replace_the_stored_one() {
	let server = MockServer::start_async().await;
	let _rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/me/").header("authorization", "Bearer expiredA");
			then.status(401);
		})
		.await;
	let _refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access":"freshB","refresh":"nextR"}"#);
		})
		.await;
	let _replayed = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/me/").header("authorization", "Bearer freshB");
			then.status(200).header("content-type", "application/json").body(r#"{"id":1}"#);
		})
		.await;
	let (client, store, _) = client_for(&server, Some("expiredA"), Some("validR"));
	let me: Value = client.get("me/").await.expect("The replayed request should succeed.");

	assert_eq!(me, json!({ "id": 1 }));
	assert_eq!(store.peek("refresh_token"), Some("nextR".into()));
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh_when_coalescing() {
	let server = MockServer::start_async().await;
	let _rejected = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer expiredA");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/");
			then.status(200).header("content-type", "application/json").body(r#"{"access":"freshB"}"#);
		})
		.await;
	let products = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products/").header("authorization", "Bearer freshB");
			then.status(200).header("content-type", "application/json").body(PRODUCTS);
		})
		.await;
	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders/").header("authorization", "Bearer freshB");
			then.status(200).header("content-type", "application/json").body(r#"{"count":0}"#);
		})
		.await;
	let (client, _, _) = client_for(&server, Some("expiredA"), Some("validR"));
	let (first, second) = tokio::join!(client.get::<Value>("products/"), client.get::<Value>("orders/"));

	first.expect("The products request should succeed after the shared refresh.");
	second.expect("The orders request should succeed after the shared refresh.");
	refresh.assert_calls_async(1).await;
	products.assert_calls_async(1).await;
	orders.assert_calls_async(1).await;

	assert_eq!(client.refresh_metrics().attempts(), 1);
	assert_eq!(client.refresh_metrics().coalesced(), 1);
}

#[tokio::test]
async fn independent_policy_refreshes_once_per_rejected_request() {
	let server = MockServer::start_async().await;
	let _rejected = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer expiredA");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token/refresh/");
			then.status(200).header("content-type", "application/json").body(r#"{"access":"freshB"}"#);
		})
		.await;
	let _replayed = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer freshB");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let config = config_builder(&server)
		.refresh_policy(RefreshPolicy::Independent)
		.build()
		.expect("Configuration should be valid.");
	let (client, store, _) = build_client(config, seeded_store(Some("expiredA"), Some("validR")));
	let (first, second) = tokio::join!(client.get::<Value>("products/"), client.get::<Value>("orders/"));

	first.expect("The products request should succeed.");
	second.expect("The orders request should succeed.");
	refresh.assert_calls_async(2).await;

	assert_eq!(store.peek("access_token"), Some("freshB".into()));
	assert_eq!(client.refresh_metrics().coalesced(), 0);
}
