//! The authenticated API client: request dispatch, transparent refresh, and session lifecycle.

pub mod dispatch;
pub mod refresh;
pub mod session;

#[cfg(test)] pub(crate) mod testing;

pub use dispatch::*;
pub use refresh::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use http::Method;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	events::{NoopListener, SessionListener},
	request::{ApiRequest, MultipartForm},
	store::SessionStore,
	transport::ApiTransport,
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Authenticated client for one tenant of a REST back-end.
///
/// The client owns the transport, the injected token store, and the session listener so page
/// code only ever says what it wants (`GET products/`) and gets JSON, bytes, or a structured
/// error back. Clones are cheap and share the transport, store, metrics, and refresh guard.
pub struct ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Transport used for every outbound request.
	pub transport: Arc<T>,
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Persistent token store holding `access_token` / `refresh_token`.
	pub store: Arc<dyn SessionStore>,
	/// Session-scoped storage wiped wholesale on logout.
	pub session_storage: Option<Arc<dyn SessionStore>>,
	/// Receives session lifecycle events.
	pub listener: Arc<dyn SessionListener>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_guard: Arc<AsyncMutex<()>>,
	session_epoch: Arc<AtomicU64>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn SessionStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			config: Arc::new(config),
			store,
			session_storage: None,
			listener: Arc::new(NoopListener),
			refresh_metrics: Default::default(),
			refresh_guard: Default::default(),
			session_epoch: Default::default(),
		}
	}

	/// Sets the listener notified about refreshes, expiry, and logout.
	pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
		self.listener = listener;

		self
	}

	/// Attaches session-scoped storage that logout clears wholesale.
	pub fn with_session_storage(mut self, storage: Arc<dyn SessionStore>) -> Self {
		self.session_storage = Some(storage);

		self
	}

	/// `GET path` decoded as `R`.
	pub async fn get<R>(&self, path: &str) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.execute(ApiRequest::get(path)).await?.decode()
	}

	/// `POST path` with a JSON body, decoded as `R`.
	pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.json_call(Method::POST, path, body).await
	}

	/// `PUT path` with a JSON body, decoded as `R`.
	pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.json_call(Method::PUT, path, body).await
	}

	/// `PATCH path` with a JSON body, decoded as `R`.
	pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.json_call(Method::PATCH, path, body).await
	}

	/// `DELETE path`, discarding any response body.
	pub async fn delete(&self, path: &str) -> Result<()> {
		self.execute(ApiRequest::delete(path)).await.map(|_| ())
	}

	/// `GET path` returning the raw response bytes (exports, reports).
	pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
		Ok(self.execute(ApiRequest::get(path).blob()).await?.payload.into_bytes())
	}

	/// `POST path` with a multipart body, decoded as `R`.
	pub async fn upload<R>(&self, path: &str, form: MultipartForm) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.execute(ApiRequest::post(path).multipart(form)).await?.decode()
	}

	/// Returns the validated configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Generation of the stored session; bumped whenever it is replaced or torn down.
	pub(crate) fn session_epoch(&self) -> u64 {
		self.session_epoch.load(Ordering::Acquire)
	}

	pub(crate) fn advance_session_epoch(&self) {
		self.session_epoch.fetch_add(1, Ordering::AcqRel);
	}

	async fn json_call<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		let request = ApiRequest::new(method, path).json_from(body)?;

		self.execute(request).await?.decode()
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client backed by a freshly built reqwest transport.
	pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
		Ok(Self::with_transport(config, store, ReqwestTransport::new()?))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			store: self.store.clone(),
			session_storage: self.session_storage.clone(),
			listener: self.listener.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh_guard: self.refresh_guard.clone(),
			session_epoch: self.session_epoch.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("tenant", &self.config.tenant)
			.field("refresh_policy", &self.config.refresh_policy)
			.field("session_storage_set", &self.session_storage.is_some())
			.finish()
	}
}
