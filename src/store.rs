//! Storage contracts and built-in key/value stores for session tokens.
//!
//! The client never touches ambient storage: every read and write goes through an injected
//! [`SessionStore`], so hosts decide where tokens live (process memory, a JSON file, a
//! platform keychain) and tests can swap in an in-memory fake.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenKey, TokenSecret},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Shared, mutable key/value storage for session state.
///
/// Implementations are shared process-wide behind `Arc<dyn SessionStore>` and may be read or
/// overwritten by any in-flight request, so every operation must be safe to call
/// concurrently.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Persists or replaces the value stored under `key`.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes the value stored under `key`; missing keys are not an error.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Removes every stored value.
	fn clear(&self) -> StoreFuture<'_, ()>;
}
impl dyn SessionStore {
	/// Reads a session token.
	pub async fn token(&self, key: TokenKey) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.get(key.as_str()).await?.filter(|value| !value.is_empty()).map(TokenSecret::new))
	}

	/// Writes a session token.
	pub async fn set_token(&self, key: TokenKey, secret: &TokenSecret) -> Result<(), StoreError> {
		self.set(key.as_str(), secret.expose().to_owned()).await
	}

	/// Removes both session tokens, attempting each even if the first removal fails.
	pub async fn remove_tokens(&self) -> Result<(), StoreError> {
		let mut first_failure = None;

		for key in TokenKey::ALL {
			if let Err(e) = self.remove(key.as_str()).await {
				first_failure.get_or_insert(e);
			}
		}

		match first_failure {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn token_helpers_use_persisted_key_names() {
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn SessionStore> = backend.clone();

		store
			.set_token(TokenKey::Access, &TokenSecret::new("expiredA"))
			.await
			.expect("Writing the access token should succeed.");

		assert_eq!(
			backend.get("access_token").await.expect("Raw read should succeed."),
			Some("expiredA".into())
		);
		assert_eq!(
			store
				.token(TokenKey::Access)
				.await
				.expect("Typed read should succeed.")
				.map(|secret| secret.expose().to_owned()),
			Some("expiredA".into())
		);
	}

	#[tokio::test]
	async fn empty_values_read_as_missing_tokens() {
		let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::default());

		store.set("refresh_token", String::new()).await.expect("Write should succeed.");

		assert!(store.token(TokenKey::Refresh).await.expect("Read should succeed.").is_none());
	}

	#[tokio::test]
	async fn remove_tokens_leaves_unrelated_keys() {
		let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::default());

		store.set("access_token", "a".into()).await.expect("Write should succeed.");
		store.set("refresh_token", "r".into()).await.expect("Write should succeed.");
		store.set("theme", "dark".into()).await.expect("Write should succeed.");
		store.remove_tokens().await.expect("Token removal should succeed.");

		assert!(store.get("access_token").await.expect("Read should succeed.").is_none());
		assert!(store.get("refresh_token").await.expect("Read should succeed.").is_none());
		assert_eq!(store.get("theme").await.expect("Read should succeed."), Some("dark".into()));
	}
}
