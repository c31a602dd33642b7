//! Path-addressed parameter-store backend
//!
//! Each key is stored individually under its full `/`-separated path.
//! Prefix reads are paginated with a continuation token; the page size
//! drops to 10 when decryption is requested, since pages of secure
//! values are batch-decrypted by the service under that limit.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, UNIX_EPOCH};

use super::client::{check_status, ServiceClient};
use super::types::{KeyType, RemoteKey};
use super::{BackendKind, RemoteStore};
use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// Page size for reads that may include secure values
const SECURE_PAGE_SIZE: usize = 10;
/// Page size for plain reads
const PLAIN_PAGE_SIZE: usize = 50;
/// Upper bound on continuation-token loops
const MAX_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParameter {
	name: String,
	#[serde(default)]
	value: String,
	#[serde(default, rename = "type")]
	kind: KeyType,
	#[serde(default)]
	version: u64,
	#[serde(default)]
	last_modified: Option<u64>,
}

impl WireParameter {
	fn into_remote_key(self) -> RemoteKey {
		let (path, name) = split_full_path(&self.name);
		RemoteKey {
			path,
			name,
			value: self.value,
			kind: self.kind,
			version: self.version,
			last_modified: self.last_modified.map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
	#[serde(default)]
	parameters: Vec<WireParameter>,
	#[serde(default)]
	next_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePut<'a> {
	name: &'a str,
	value: &'a str,
	#[serde(rename = "type")]
	kind: KeyType,
	overwrite: bool,
}

/// Split `/a/b/NAME` into (`/a/b/`, `NAME`)
fn split_full_path(full: &str) -> (String, String) {
	match full.rfind('/') {
		Some(pos) => (full[..pos + 1].to_string(), full[pos + 1..].to_string()),
		None => (String::new(), full.to_string()),
	}
}

/// Parameter-store adapter
#[derive(Debug, Clone)]
pub struct ParameterStore {
	client: ServiceClient,
}

impl ParameterStore {
	pub fn new(client: ServiceClient) -> Self {
		ParameterStore { client }
	}
}

#[async_trait]
impl RemoteStore for ParameterStore {
	fn backend(&self) -> BackendKind {
		BackendKind::ParameterStore
	}

	async fn get_one(&self, path: &str) -> EnvyResult<Option<RemoteKey>> {
		let request = self
			.client
			.request(Method::GET, "parameter")?
			.query(&[("name", path), ("decrypt", "true")]);
		let response = self.client.send(request).await?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let response =
			check_status(response, ErrorKind::ParamNotFound, ErrorKind::ParamExists).await?;
		let wire: WireParameter = response.json().await.map_err(|e| {
			EnvyError::wrap(ErrorKind::RemoteConnection, "Malformed parameter response", e)
		})?;
		Ok(Some(wire.into_remote_key()))
	}

	async fn get_by_prefix(
		&self,
		path: &str,
		recursive: bool,
		decrypt: bool,
	) -> EnvyResult<Vec<RemoteKey>> {
		let page_size = if decrypt { SECURE_PAGE_SIZE } else { PLAIN_PAGE_SIZE };
		let mut keys = Vec::new();
		let mut seen: HashSet<String> = HashSet::new();
		let mut next_token: Option<String> = None;

		for _ in 0..MAX_PAGES {
			let mut request = self.client.request(Method::GET, "parameters")?.query(&[
				("path", path),
				("recursive", if recursive { "true" } else { "false" }),
				("decrypt", if decrypt { "true" } else { "false" }),
				("pageSize", &page_size.to_string()),
			]);
			if let Some(token) = &next_token {
				request = request.query(&[("nextToken", token.as_str())]);
			}

			let response = self.client.send(request).await?;
			let response =
				check_status(response, ErrorKind::ParamNotFound, ErrorKind::ParamExists).await?;
			let page: WirePage = response.json().await.map_err(|e| {
				EnvyError::wrap(ErrorKind::RemoteConnection, "Malformed parameter page", e)
			})?;

			for wire in page.parameters {
				let key = wire.into_remote_key();
				if seen.insert(key.full_path()) {
					keys.push(key);
				}
			}

			match page.next_token {
				// A server echoing the same token back would loop forever
				Some(token) if Some(&token) != next_token.as_ref() => next_token = Some(token),
				_ => break,
			}
		}

		Ok(keys)
	}

	async fn put(
		&self,
		path: &str,
		value: &str,
		kind: KeyType,
		overwrite: bool,
	) -> EnvyResult<()> {
		let body = WirePut { name: path, value, kind, overwrite };
		let request = self.client.request(Method::PUT, "parameter")?.json(&body);
		let response = self.client.send(request).await?;
		check_status(response, ErrorKind::ParamNotFound, ErrorKind::ParamExists)
			.await
			.map_err(|err| {
				if err.kind == ErrorKind::ParamExists {
					EnvyError::new(
						ErrorKind::ParamExists,
						format!("Parameter '{}' already exists (use overwrite to replace)", path),
					)
				} else {
					err
				}
			})?;
		Ok(())
	}

	async fn put_bulk(
		&self,
		path: &str,
		values: &BTreeMap<String, String>,
		overwrite: bool,
	) -> EnvyResult<()> {
		// The parameter backend has no bulk write; fan-out is the
		// caller's job via the pool. This shape exists for the secret
		// backend, so emulate it sequentially for completeness.
		for (name, value) in values {
			let full = format!("{}{}", path, name);
			self.put(&full, value, super::types::infer_key_type(name), overwrite).await?;
		}
		Ok(())
	}

	async fn delete(&self, path: &str) -> EnvyResult<()> {
		let request = self.client.request(Method::DELETE, "parameter")?.query(&[("name", path)]);
		let response = self.client.send(request).await?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			// Absence is not an error
			return Ok(());
		}
		check_status(response, ErrorKind::ParamNotFound, ErrorKind::ParamExists).await?;
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
	fn test_split_full_path() {
		assert_eq!(
			split_full_path("/shop/dev/DB_URL"),
			("/shop/dev/".to_string(), "DB_URL".to_string())
		);
		assert_eq!(split_full_path("NAME"), (String::new(), "NAME".to_string()));
	}

	#[test]
	fn test_wire_parameter_conversion() {
		let wire: WireParameter = serde_json::from_str(
			r#"{"name":"/shop/dev/PORT","value":"8080","type":"plain","version":3,"lastModified":1700000000}"#,
		)
		.unwrap();
		let key = wire.into_remote_key();
		assert_eq!(key.path, "/shop/dev/");
		assert_eq!(key.name, "PORT");
		assert_eq!(key.kind, KeyType::Plain);
		assert_eq!(key.version, 3);
		assert!(key.last_modified.is_some());
	}
}

// vim: ts=4
