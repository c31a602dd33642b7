//! Named-secret backend
//!
//! The path prefix minus its trailing `/` is the secret name; the
//! secret body is a JSON mapping of variable names to values. Prefix
//! reads fetch the single secret and expand its body into one
//! [`RemoteKey`] per entry. Bulk writes replace the body in one
//! request; single-key writes read-modify-write it.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, UNIX_EPOCH};

use super::client::{check_status, ServiceClient};
use super::types::{infer_key_type, KeyType, RemoteKey};
use super::{BackendKind, RemoteStore};
use crate::error::{EnvyError, EnvyResult, ErrorKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSecret {
	#[allow(dead_code)]
	name: String,
	#[serde(default)]
	payload: BTreeMap<String, String>,
	#[serde(default)]
	version: u64,
	#[serde(default)]
	last_modified: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSecretPut<'a> {
	name: &'a str,
	payload: &'a BTreeMap<String, String>,
	overwrite: bool,
}

/// `/shop/prod/` names the secret `/shop/prod`
fn secret_name(path: &str) -> &str {
	path.trim_end_matches('/')
}

/// `/shop/prod/DB_URL` addresses key `DB_URL` of secret `/shop/prod`
fn split_key_path(path: &str) -> EnvyResult<(&str, &str)> {
	match path.trim_end_matches('/').rfind('/') {
		Some(pos) => Ok((&path[..pos], &path[pos + 1..])),
		None => Err(EnvyError::new(
			ErrorKind::InvalidKeyFormat,
			format!("'{}' does not address a key inside a secret", path),
		)),
	}
}

/// Secret-store adapter
#[derive(Debug, Clone)]
pub struct SecretStore {
	client: ServiceClient,
}

impl SecretStore {
	pub fn new(client: ServiceClient) -> Self {
		SecretStore { client }
	}

	/// Fetch a secret's body, or None when it does not exist
	async fn fetch(&self, name: &str) -> EnvyResult<Option<WireSecret>> {
		let request = self.client.request(Method::GET, "secret")?.query(&[("name", name)]);
		let response = self.client.send(request).await?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let response =
			check_status(response, ErrorKind::SecretNotFound, ErrorKind::SecretExists).await?;
		let wire: WireSecret = response.json().await.map_err(|e| {
			EnvyError::wrap(ErrorKind::RemoteConnection, "Malformed secret response", e)
		})?;
		Ok(Some(wire))
	}

	/// Replace a secret's body
	async fn store(
		&self,
		name: &str,
		payload: &BTreeMap<String, String>,
		overwrite: bool,
	) -> EnvyResult<()> {
		let body = WireSecretPut { name, payload, overwrite };
		let request = self.client.request(Method::PUT, "secret")?.json(&body);
		let response = self.client.send(request).await?;
		check_status(response, ErrorKind::SecretNotFound, ErrorKind::SecretExists)
			.await
			.map_err(|err| {
				if err.kind == ErrorKind::ParamExists || err.kind == ErrorKind::SecretExists {
					EnvyError::new(
						ErrorKind::SecretExists,
						format!("Secret '{}' already exists (use overwrite to replace)", name),
					)
				} else {
					err
				}
			})?;
		Ok(())
	}
}

#[async_trait]
impl RemoteStore for SecretStore {
	fn backend(&self) -> BackendKind {
		BackendKind::SecretStore
	}

	async fn get_one(&self, path: &str) -> EnvyResult<Option<RemoteKey>> {
		let (secret, key) = split_key_path(path)?;
		let wire = match self.fetch(secret_name(secret)).await? {
			Some(wire) => wire,
			None => return Ok(None),
		};
		let last_modified = wire.last_modified.map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
		Ok(wire.payload.get(key).map(|value| RemoteKey {
			path: format!("{}/", secret_name(secret)),
			name: key.to_string(),
			value: value.clone(),
			kind: infer_key_type(key),
			version: wire.version,
			last_modified,
		}))
	}

	async fn get_by_prefix(
		&self,
		path: &str,
		_recursive: bool,
		_decrypt: bool,
	) -> EnvyResult<Vec<RemoteKey>> {
		let name = secret_name(path);
		let wire = match self.fetch(name).await? {
			Some(wire) => wire,
			None => return Ok(Vec::new()),
		};
		let last_modified = wire.last_modified.map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
		let prefix = format!("{}/", name);
		Ok(wire
			.payload
			.into_iter()
			.map(|(key, value)| RemoteKey {
				path: prefix.clone(),
				name: key.clone(),
				kind: infer_key_type(&key),
				value,
				version: wire.version,
				last_modified,
			})
			.collect())
	}

	async fn put(
		&self,
		path: &str,
		value: &str,
		_kind: KeyType,
		overwrite: bool,
	) -> EnvyResult<()> {
		let (secret, key) = split_key_path(path)?;
		let name = secret_name(secret);

		// Read-modify-write: per-key puts cannot replace the whole body
		let mut payload =
			self.fetch(name).await?.map(|wire| wire.payload).unwrap_or_default();
		if payload.contains_key(key) && !overwrite {
			return Err(EnvyError::new(
				ErrorKind::SecretExists,
				format!("Key '{}' already exists in secret '{}' (use overwrite to replace)", key, name),
			));
		}
		payload.insert(key.to_string(), value.to_string());
		self.store(name, &payload, true).await
	}

	async fn put_bulk(
		&self,
		path: &str,
		values: &BTreeMap<String, String>,
		overwrite: bool,
	) -> EnvyResult<()> {
		let name = secret_name(path);
		if !overwrite {
			if let Some(existing) = self.fetch(name).await? {
				if !existing.payload.is_empty() {
					return Err(EnvyError::new(
						ErrorKind::SecretExists,
						format!("Secret '{}' already exists (use overwrite to replace)", name),
					));
				}
			}
		}
		self.store(name, values, true).await
	}

	async fn delete(&self, path: &str) -> EnvyResult<()> {
		if path.ends_with('/') {
			// Deleting the prefix deletes the whole secret
			let request = self
				.client
				.request(Method::DELETE, "secret")?
				.query(&[("name", secret_name(path))]);
			let response = self.client.send(request).await?;
			if response.status() == reqwest::StatusCode::NOT_FOUND {
				return Ok(());
			}
			check_status(response, ErrorKind::SecretNotFound, ErrorKind::SecretExists).await?;
			return Ok(());
		}

		let (secret, key) = split_key_path(path)?;
		let name = secret_name(secret);
		let mut payload = match self.fetch(name).await? {
			Some(wire) => wire.payload,
			None => return Ok(()),
		};
		if payload.remove(key).is_some() {
			self.store(name, &payload, true).await?;
		}
		Ok(())
	}

	async fn list(&self, path: &str, recursive: bool) -> EnvyResult<Vec<String>> {
		let keys = self.get_by_prefix(path, recursive, false).await?;
		Ok(keys.into_iter().map(|k| k.full_path()).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_secret_name_strips_trailing_slash() {
		assert_eq!(secret_name("/shop/prod/"), "/shop/prod");
		assert_eq!(secret_name("/shop/prod"), "/shop/prod");
	}

	#[test]
	fn test_split_key_path() {
		let (secret, key) = split_key_path("/shop/prod/DB_URL").unwrap();
		assert_eq!(secret, "/shop/prod");
		assert_eq!(key, "DB_URL");

		assert!(split_key_path("NAME").is_err());
	}

	#[test]
	fn test_wire_secret_parse() {
		let wire: WireSecret = serde_json::from_str(
			r#"{"name":"/shop/prod","payload":{"A":"1","B":"2"},"version":7}"#,
		)
		.unwrap();
		assert_eq!(wire.payload.len(), 2);
		assert_eq!(wire.version, 7);
	}
}

// vim: ts=4
