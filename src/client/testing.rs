//! Scripted in-process transport for unit tests.

// crates.io
use http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::TenantId,
	client::ApiClient,
	config::ClientConfig,
	error::TransportError,
	events::RecordingListener,
	store::MemoryStore,
	transport::{ApiTransport, TransportBody, TransportFuture, TransportRequest, TransportResponse},
};

type Script =
	dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Answers every request with the provided closure and records what was sent.
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
	script: Arc<Script>,
	requests: Arc<Mutex<Vec<TransportRequest>>>,
}
impl ScriptedTransport {
	pub(crate) fn new<F>(script: F) -> Self
	where
		F: 'static + Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync,
	{
		Self { script: Arc::new(script), requests: Default::default() }
	}

	pub(crate) fn requests(&self) -> Vec<TransportRequest> {
		self.requests.lock().clone()
	}

	/// JSON bodies of the recorded requests, in send order.
	pub(crate) fn request_bodies(&self) -> Vec<JsonValue> {
		self.requests()
			.into_iter()
			.filter_map(|request| match request.body {
				TransportBody::Bytes(bytes) => serde_json::from_slice(&bytes).ok(),
				_ => None,
			})
			.collect()
	}
}
impl ApiTransport for ScriptedTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		let outcome = (self.script)(&request);

		self.requests.lock().push(request);

		Box::pin(async move { outcome })
	}
}

pub(crate) fn json_response(status: StatusCode, body: &str) -> TransportResponse {
	TransportResponse::new(status, body.as_bytes().to_vec())
}

/// Builds a client for tenant `acme` whose store holds `tokens` (access, optional refresh).
pub(crate) fn client_with(
	transport: ScriptedTransport,
	tokens: Option<(&str, Option<&str>)>,
) -> (ApiClient<ScriptedTransport>, MemoryStore, RecordingListener) {
	let config = ClientConfig::builder(
		Url::parse("https://erp.example.com/api/").expect("Base URL fixture should parse."),
		TenantId::new("acme").expect("Tenant fixture should be valid."),
	)
	.build()
	.expect("Configuration fixture should be valid.");
	let store: MemoryStore = match tokens {
		Some((access, refresh)) => {
			let mut entries = vec![("access_token", access)];

			entries.extend(refresh.map(|refresh| ("refresh_token", refresh)));

			entries.into_iter().collect()
		},
		None => MemoryStore::default(),
	};
	let listener = RecordingListener::default();
	let client = ApiClient::with_transport(config, Arc::new(store.clone()), transport)
		.with_listener(Arc::new(listener.clone()));

	(client, store, listener)
}
