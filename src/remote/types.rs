//! Remote key model and sensitive-name classification

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Storage class of a remote key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
	#[default]
	Plain,
	/// Encrypted at rest by the service
	Secure,
	/// Comma-separated list value
	List,
}

/// One key as stored remotely
///
/// `path` is the `/`-separated prefix; the full identity is
/// `path + name`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteKey {
	pub path: String,
	pub name: String,
	pub value: String,
	pub kind: KeyType,
	pub version: u64,
	pub last_modified: Option<SystemTime>,
}

impl RemoteKey {
	/// Full remote identity (`path + name`)
	pub fn full_path(&self) -> String {
		format!("{}{}", self.path, self.name)
	}
}

/// Substrings that mark a name as sensitive
const SENSITIVE_SUBSTRINGS: &[&str] = &[
	"password", "secret", "token", "key", "credential", "auth", "private", "cert",
];

/// Suffix patterns that mark a name as sensitive
const SENSITIVE_SUFFIXES: &[&str] =
	&["_password", "_key", "_token", "_auth", "_credential", "_private"];

/// Prefix patterns that mark a name as sensitive
const SENSITIVE_PREFIXES: &[&str] = &["secret_", "private_", "auth_"];

/// Whether a key name should be stored securely and displayed masked
///
/// Matching is case-insensitive over substrings, suffixes and prefixes.
pub fn is_sensitive_name(name: &str) -> bool {
	let lower = name.to_lowercase();
	SENSITIVE_SUBSTRINGS.iter().any(|s| lower.contains(s))
		|| SENSITIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
		|| SENSITIVE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Storage class inferred from a key name
pub fn infer_key_type(name: &str) -> KeyType {
	if is_sensitive_name(name) {
		KeyType::Secure
	} else {
		KeyType::Plain
	}
}

/// Mask a value for display when its name is sensitive
pub fn display_value(name: &str, value: &str) -> String {
	if is_sensitive_name(name) {
		"********".to_string()
	} else {
		value.to_string()
	}
}


// vim: ts=4
