//! Update-check cache
//!
//! Release lookups are throttled through a small JSON cache file at
//! `$XDG_CACHE_HOME/envy/.envy-update-cache`: at most one remote check
//! every 24 hours. Failures are logged and swallowed; an update check
//! never affects the command that triggered it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::cache::default_cache_dir;

/// Minimum interval between remote checks
pub const CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache file name under the envy cache directory
pub const CACHE_FILE: &str = ".envy-update-cache";

/// Persisted state of the last check
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateCache {
	/// Seconds since the epoch of the last remote check
	pub last_check: u64,
	pub latest_version: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub release_notes: Option<String>,
}

impl UpdateCache {
	/// Whether a remote check is due
	pub fn is_stale(&self, now: SystemTime) -> bool {
		let now_secs =
			now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
		now_secs.saturating_sub(self.last_check) >= CHECK_INTERVAL.as_secs()
	}
}

fn cache_path() -> PathBuf {
	default_cache_dir().join(CACHE_FILE)
}

/// Load the persisted state; a missing or corrupt file reads as stale
pub fn load() -> UpdateCache {
	let path = cache_path();
	match fs::read_to_string(&path) {
		Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
		Err(_) => UpdateCache::default(),
	}
}

/// Persist the state after a check
pub fn store(cache: &UpdateCache) {
	let path = cache_path();
	if let Some(parent) = path.parent() {
		if fs::create_dir_all(parent).is_err() {
			return;
		}
	}
	match serde_json::to_string(cache) {
		Ok(json) => {
			if let Err(err) = fs::write(&path, json) {
				debug!(error = %err, "failed to write update cache");
			}
		}
		Err(err) => debug!(error = %err, "failed to serialize update cache"),
	}
}

/// Check for a newer release, at most once per day
///
/// Returns the latest known version string when one is available.
/// Network failures are swallowed; the cached answer is returned
/// instead.
pub async fn check(current_version: &str, release_url: &str) -> Option<String> {
	let mut cache = load();
	if cache.is_stale(SystemTime::now()) {
		match fetch_latest(release_url).await {
			Some((version, notes)) => {
				cache.last_check = SystemTime::now()
					.duration_since(UNIX_EPOCH)
					.map(|d| d.as_secs())
					.unwrap_or(0);
				cache.latest_version = version;
				cache.release_notes = notes;
				store(&cache);
			}
			None => {
				debug!("update check failed, keeping cached state");
			}
		}
	}

	if !cache.latest_version.is_empty() && cache.latest_version != current_version {
		Some(cache.latest_version)
	} else {
		None
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelease {
	version: String,
	#[serde(default)]
	notes: Option<String>,
}

async fn fetch_latest(release_url: &str) -> Option<(String, Option<String>)> {
	let client = reqwest::Client::builder()
		.timeout(Duration::from_secs(5))
		.build()
		.ok()?;
	let release: WireRelease =
		client.get(release_url).send().await.ok()?.json().await.ok()?;
	Some((release.version, release.notes))
}


// vim: ts=4
