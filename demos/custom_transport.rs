//! Plugs a custom [`ApiTransport`] into the client.
//!
//! The transport below answers from a fixture table instead of the network, the way a desktop
//! shell might serve cached data while offline. Status handling, refresh, and error shaping all
//! stay inside the client, so the transport only maps requests to raw responses.

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use color_eyre::Result;
use serde_json::Value;
// self
use erp_api_client::{
	ApiClient, ClientConfig,
	auth::{SessionCredentials, TenantId},
	error::TransportError,
	http::StatusCode,
	store::MemoryStore,
	transport::{ApiTransport, TransportFuture, TransportRequest, TransportResponse},
	url::Url,
};

/// Serves canned JSON keyed by request path; anything else is a `404`.
#[derive(Debug, Default)]
struct FixtureTransport {
	fixtures: HashMap<&'static str, &'static str>,
}
impl FixtureTransport {
	fn with(mut self, path: &'static str, body: &'static str) -> Self {
		self.fixtures.insert(path, body);

		self
	}
}
impl ApiTransport for FixtureTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			if request.url.host_str() != Some("erp.example.com") {
				return Err(TransportError::Io(std::io::ErrorKind::NotConnected.into()));
			}

			let response = match self.fixtures.get(request.url.path()) {
				Some(body) => TransportResponse::new(StatusCode::OK, body.as_bytes().to_vec()),
				None => TransportResponse::new(StatusCode::NOT_FOUND, br#"{"detail":"Not found."}"#.to_vec()),
			};

			Ok(response)
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let transport = FixtureTransport::default()
		.with("/api/dashboard/summary/", r#"{"open_orders":12,"low_stock":3}"#)
		.with("/api/products/", r#"{"count":1,"results":[{"sku":"BOLT-M8"}]}"#);
	let config = ClientConfig::builder(
		Url::parse("https://erp.example.com/api/")?,
		TenantId::new("acme-manufacturing")?,
	)
	.build()?;
	let client: ApiClient<FixtureTransport> =
		ApiClient::with_transport(config, Arc::new(MemoryStore::default()), transport);

	client.restore_session(&SessionCredentials::new("cachedA", "cachedR")).await?;

	let summary: Value = client.get("dashboard/summary/").await?;

	println!("Dashboard summary served offline: {summary}.");

	match client.get::<Value>("invoices/").await {
		Ok(_) => println!("Unexpected fixture for invoices."),
		Err(e) => println!(
			"Missing fixture surfaced as HTTP {:?}: {:?}.",
			e.status(),
			e.as_api().and_then(|api| api.detail())
		),
	}

	Ok(())
}
