//! Shared fixtures for the httpmock-backed integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use erp_api_client::{
	ClientConfig,
	auth::TenantId,
	client::ReqwestApiClient,
	config::ClientConfigBuilder,
	events::RecordingListener,
	store::MemoryStore,
	url::Url,
};

pub const TENANT: &str = "acme-manufacturing";

/// Configuration pointing every endpoint at `server`, with the API under `/api/`.
pub fn config_builder(server: &MockServer) -> ClientConfigBuilder {
	let base_url = Url::parse(&server.url("/api/")).expect("Mock base URL should parse.");
	let tenant = TenantId::new(TENANT).expect("Tenant fixture should be valid.");

	ClientConfig::builder(base_url, tenant)
}

/// Seeds a memory store with an access token and an optional refresh token.
pub fn seeded_store(access: Option<&str>, refresh: Option<&str>) -> MemoryStore {
	access
		.map(|token| ("access_token", token))
		.into_iter()
		.chain(refresh.map(|token| ("refresh_token", token)))
		.collect()
}

/// Builds a reqwest-backed client plus handles on its store and listener.
pub fn build_client(
	config: ClientConfig,
	store: MemoryStore,
) -> (ReqwestApiClient, MemoryStore, RecordingListener) {
	let listener = RecordingListener::default();
	let client = ReqwestApiClient::new(config, Arc::new(store.clone()))
		.expect("Reqwest client should build for integration tests.")
		.with_listener(Arc::new(listener.clone()));

	(client, store, listener)
}

/// Shorthand for the common case: default configuration against `server`.
pub fn client_for(
	server: &MockServer,
	access: Option<&str>,
	refresh: Option<&str>,
) -> (ReqwestApiClient, MemoryStore, RecordingListener) {
	let config = config_builder(server).build().expect("Mock configuration should be valid.");

	build_client(config, seeded_store(access, refresh))
}
