//! In-process remote store
//!
//! Backs tests and offline dry runs with the same interface as the
//! real services. Keys live in a `RwLock`-guarded map keyed by full
//! path.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::SystemTime;

use super::types::{KeyType, RemoteKey};
use super::{BackendKind, RemoteStore};
use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// Map-backed store
#[derive(Debug, Default)]
pub struct MemoryStore {
	keys: RwLock<BTreeMap<String, RemoteKey>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		MemoryStore::default()
	}

	/// Seed the store (tests)
	pub fn with_keys(keys: impl IntoIterator<Item = RemoteKey>) -> Self {
		let store = MemoryStore::new();
		{
			let mut guard = store.keys.write().unwrap_or_else(|e| e.into_inner());
			for key in keys {
				guard.insert(key.full_path(), key);
			}
		}
		store
	}

	/// Snapshot of every stored key (tests)
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.keys
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.values()
			.map(|k| (k.full_path(), k.value.clone()))
			.collect()
	}

	fn matches(full: &str, prefix: &str, recursive: bool) -> bool {
		match full.strip_prefix(prefix) {
			Some(rest) => recursive || !rest.contains('/'),
			None => false,
		}
	}
}

#[async_trait]
impl RemoteStore for MemoryStore {
	fn backend(&self) -> BackendKind {
		BackendKind::Memory
	}

	async fn get_one(&self, path: &str) -> EnvyResult<Option<RemoteKey>> {
		Ok(self.keys.read().unwrap_or_else(|e| e.into_inner()).get(path).cloned())
	}

	async fn get_by_prefix(
		&self,
		path: &str,
		recursive: bool,
		_decrypt: bool,
	) -> EnvyResult<Vec<RemoteKey>> {
		Ok(self
			.keys
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.iter()
			.filter(|(full, _)| Self::matches(full, path, recursive))
			.map(|(_, key)| key.clone())
			.collect())
	}

	async fn put(
		&self,
		path: &str,
		value: &str,
		kind: KeyType,
		overwrite: bool,
	) -> EnvyResult<()> {
		let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
		if keys.contains_key(path) && !overwrite {
			return Err(EnvyError::new(
				ErrorKind::ParamExists,
				format!("Parameter '{}' already exists (use overwrite to replace)", path),
			));
		}
		let version = keys.get(path).map(|k| k.version + 1).unwrap_or(1);
		let (prefix, name) = match path.rfind('/') {
			Some(pos) => (path[..pos + 1].to_string(), path[pos + 1..].to_string()),
			None => (String::new(), path.to_string()),
		};
		keys.insert(
			path.to_string(),
			RemoteKey {
				path: prefix,
				name,
				value: value.to_string(),
				kind,
				version,
				last_modified: Some(SystemTime::now()),
			},
		);
		Ok(())
	}

	async fn put_bulk(
		&self,
		path: &str,
		values: &BTreeMap<String, String>,
		overwrite: bool,
	) -> EnvyResult<()> {
		for (name, value) in values {
			let full = format!("{}{}", path, name);
			self.put(&full, value, super::types::infer_key_type(name), overwrite).await?;
		}
		Ok(())
	}

	async fn delete(&self, path: &str) -> EnvyResult<()> {
		self.keys.write().unwrap_or_else(|e| e.into_inner()).remove(path);
		Ok(())
	}

	async fn list(&self, path: &str, recursive: bool) -> EnvyResult<Vec<String>> {
		let keys = self.get_by_prefix(path, recursive, false).await?;
		Ok(keys.into_iter().map(|k| k.full_path()).collect())
	}
}


// vim: ts=4
