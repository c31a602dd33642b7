//! Remote store abstraction
//!
//! One interface over two backend shapes: a path-addressed parameter
//! store and a named-secret store whose body is a JSON mapping. The
//! engine depends only on [`RemoteStore`]; the concrete adapter is
//! selected per environment at construction.

pub mod client;
pub mod memory;
pub mod parameter_store;
pub mod secret_store;
pub mod types;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Environment, Project};
use crate::error::EnvyResult;
use crate::retry::RetryPolicy;

pub use self::memory::MemoryStore;
pub use self::parameter_store::ParameterStore;
pub use self::secret_store::SecretStore;
pub use self::types::{display_value, infer_key_type, is_sensitive_name, KeyType, RemoteKey};

/// The backend flavor behind a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
	ParameterStore,
	SecretStore,
	/// In-process store for tests and offline runs
	Memory,
}

/// Uniform parameter/secret operations
///
/// Implementations are immutable after construction and safe to share
/// across tasks. Operations are per-key; there is no multi-key
/// atomicity beyond what `put_bulk` provides on the secret backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
	/// Which backend this store talks to
	fn backend(&self) -> BackendKind;

	/// Fetch a single key by full path
	async fn get_one(&self, path: &str) -> EnvyResult<Option<RemoteKey>>;

	/// Fetch every key under a path prefix
	///
	/// Paginated internally; the returned sequence is deduplicated by
	/// full identity.
	async fn get_by_prefix(
		&self,
		path: &str,
		recursive: bool,
		decrypt: bool,
	) -> EnvyResult<Vec<RemoteKey>>;

	/// Store one key
	///
	/// Fails with the backend's exists-kind when the key is present and
	/// `overwrite` is false.
	async fn put(&self, path: &str, value: &str, kind: KeyType, overwrite: bool)
		-> EnvyResult<()>;

	/// Store a whole mapping under a path prefix
	async fn put_bulk(
		&self,
		path: &str,
		values: &BTreeMap<String, String>,
		overwrite: bool,
	) -> EnvyResult<()>;

	/// Delete a key; absence is not an error
	async fn delete(&self, path: &str) -> EnvyResult<()>;

	/// List full key paths under a prefix
	async fn list(&self, path: &str, recursive: bool) -> EnvyResult<Vec<String>>;
}

/// Select and build the store for an environment
pub fn store_for_environment(
	project: &Project,
	environment: &Environment,
) -> EnvyResult<Arc<dyn RemoteStore>> {
	let client = client::ServiceClient::for_project(project)?;
	if environment.use_secret_store {
		Ok(Arc::new(SecretStore::new(client)))
	} else {
		Ok(Arc::new(ParameterStore::new(client)))
	}
}

/// Retry policy tuned per backend
///
/// The secret backend's read-modify-write puts are costlier to repeat,
/// so it backs off harder between fewer attempts.
pub fn retry_policy(backend: BackendKind) -> RetryPolicy {
	match backend {
		BackendKind::ParameterStore => RetryPolicy::exponential_with_jitter(
			4,
			Duration::from_millis(200),
			Duration::from_secs(5),
		),
		BackendKind::SecretStore => RetryPolicy::exponential_with_jitter(
			3,
			Duration::from_millis(500),
			Duration::from_secs(8),
		),
		BackendKind::Memory => RetryPolicy::none(),
	}
}

// vim: ts=4
