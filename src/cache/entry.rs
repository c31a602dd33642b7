//! Cache entry envelope and tagged values
//!
//! Entries are persisted as a JSON envelope. Values are a closed set of
//! tagged variants rather than reflected runtime types: ordered env
//! files, plain string maps, or raw JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::envfile::EnvFile;

/// Tagged cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valueType", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
	/// An env file flattened to values plus explicit key order
	/// (comments are not persisted)
	EnvFile {
		variables: BTreeMap<String, String>,
		order: Vec<String>,
	},
	/// A plain name/value snapshot
	StringMap(BTreeMap<String, String>),
	/// Anything else, as raw JSON
	Generic(serde_json::Value),
}

impl CachedValue {
	/// Flatten an env file for caching
	pub fn from_env_file(file: &EnvFile) -> Self {
		CachedValue::EnvFile {
			variables: file.to_map(),
			order: file.keys().cloned().collect(),
		}
	}

	/// Rebuild an ordered env file from a cached flattening
	pub fn to_env_file(&self) -> Option<EnvFile> {
		match self {
			CachedValue::EnvFile { variables, order } => {
				let mut file = EnvFile::new();
				for key in order {
					if let Some(value) = variables.get(key) {
						file.set(key.clone(), value.clone());
					}
				}
				Some(file)
			}
			_ => None,
		}
	}

	/// The string map inside, if this is one
	pub fn as_string_map(&self) -> Option<&BTreeMap<String, String>> {
		match self {
			CachedValue::StringMap(map) => Some(map),
			_ => None,
		}
	}
}

/// One cache entry with expiry bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
	pub key: String,
	#[serde(flatten)]
	pub value: CachedValue,
	/// Milliseconds since the epoch
	pub created_at: u64,
	/// Milliseconds since the epoch, updated on every hit
	pub last_accessed: u64,
	/// Zero means the entry never expires
	pub ttl_ms: u64,
	/// Whether the on-disk form is sealed
	pub encrypted: bool,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub metadata: BTreeMap<String, String>,
}

impl CacheEntry {
	pub fn new(key: impl Into<String>, value: CachedValue, ttl: Duration) -> Self {
		let now = now_millis();
		CacheEntry {
			key: key.into(),
			value,
			created_at: now,
			last_accessed: now,
			ttl_ms: ttl.as_millis() as u64,
			encrypted: false,
			metadata: BTreeMap::new(),
		}
	}

	/// Attach a metadata field
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}

	/// Expired iff a TTL is set and its window has passed
	pub fn is_expired(&self) -> bool {
		self.ttl_ms > 0 && now_millis().saturating_sub(self.created_at) > self.ttl_ms
	}

	/// Record a hit
	pub fn touch(&mut self) {
		self.last_accessed = now_millis();
	}

	/// Rough in-memory footprint, used for the byte cap
	pub fn estimated_size(&self) -> usize {
		let value_size = match &self.value {
			CachedValue::EnvFile { variables, order } => {
				variables.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
					+ order.iter().map(|k| k.len()).sum::<usize>()
			}
			CachedValue::StringMap(map) => {
				map.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
			}
			CachedValue::Generic(value) => value.to_string().len(),
		};
		self.key.len() + value_size + 64
	}
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_envelope_roundtrip() {
		let mut map = BTreeMap::new();
		map.insert("A".to_string(), "1".to_string());
		let entry = CacheEntry::new(
			"k",
			CachedValue::StringMap(map),
			Duration::from_secs(60),
		);

		let json = serde_json::to_string(&entry).unwrap();
		assert!(json.contains("\"valueType\":\"string_map\""));

		let back: CacheEntry = serde_json::from_str(&json).unwrap();
		assert_eq!(back, entry);
	}

	#[test]
	fn test_env_file_value_preserves_order() {
		let file = crate::envfile::EnvFile::parse_str("B=2\nA=1\nC=3\n");
		let value = CachedValue::from_env_file(&file);

		let json = serde_json::to_string(&value).unwrap();
		let back: CachedValue = serde_json::from_str(&json).unwrap();
		let rebuilt = back.to_env_file().unwrap();

		let keys: Vec<_> = rebuilt.keys().cloned().collect();
		assert_eq!(keys, vec!["B", "A", "C"]);
		assert_eq!(rebuilt.get("A"), Some("1"));
	}

	#[test]
	fn test_expiry() {
		let mut entry = CacheEntry::new(
			"k",
			CachedValue::Generic(serde_json::json!(1)),
			Duration::from_millis(50),
		);
		assert!(!entry.is_expired());

		entry.created_at = now_millis() - 100;
		assert!(entry.is_expired());
	}

	#[test]
	fn test_zero_ttl_never_expires() {
		let mut entry = CacheEntry::new(
			"k",
			CachedValue::Generic(serde_json::json!(1)),
			Duration::ZERO,
		);
		entry.created_at = 0;
		assert!(!entry.is_expired());
	}
}

// vim: ts=4
