//! Hybrid cache for remote reads and local parses
//!
//! Two tiers behind one front: a bounded in-memory LRU map and a
//! file-per-key disk store, selected by [`CacheKind`]. Hybrid mode
//! writes through to both and promotes disk hits into memory. Entries
//! carry a TTL; a background sweeper removes expired entries from both
//! tiers. Sensitive entries are sealed on disk when an encryption key
//! is configured.
//!
//! Cache failures never fail the operation that used the cache: writes
//! log and fall through, reads degrade to a miss.

pub mod disk;
pub mod encryption;
pub mod entry;
pub mod memory;

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{CacheKind, CacheSettings};
use crate::error::{file_read_error, EnvyResult};
use crate::remote::types::is_sensitive_name;
use self::disk::DiskTier;
use self::encryption::Sealer;
use self::entry::{CacheEntry, CachedValue};
use self::memory::MemoryTier;

/// How often the background sweeper runs
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Monotonic counters
#[derive(Debug, Default)]
struct Stats {
	hits: AtomicU64,
	misses: AtomicU64,
	gets: AtomicU64,
	puts: AtomicU64,
}

/// Point-in-time view of cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatsSnapshot {
	pub hits: u64,
	pub misses: u64,
	pub gets: u64,
	pub puts: u64,
	pub entries: usize,
	pub size_bytes: u64,
	pub hit_rate: f64,
}

/// Two-tier TTL/LRU cache
#[derive(Debug)]
pub struct Cache {
	memory: Option<MemoryTier>,
	disk: Option<DiskTier>,
	default_ttl: Duration,
	sealing: bool,
	stats: Stats,
}

impl Cache {
	/// Build a cache from settings
	///
	/// The disk directory defaults to `$XDG_CACHE_HOME/envy` (falling
	/// back to `~/.cache/envy`).
	pub fn new(settings: &CacheSettings) -> EnvyResult<Self> {
		let memory = match settings.kind {
			CacheKind::Memory | CacheKind::Hybrid => Some(MemoryTier::new(
				settings.max_entries,
				settings.max_size_mb.saturating_mul(1024 * 1024),
			)),
			CacheKind::Disk => None,
		};

		let sealer = settings.encryption_key.as_deref().map(Sealer::new);
		let sealing = sealer.is_some();
		let disk = match settings.kind {
			CacheKind::Disk | CacheKind::Hybrid => {
				let dir = settings.dir.clone().unwrap_or_else(default_cache_dir);
				Some(DiskTier::new(dir, sealer)?)
			}
			CacheKind::Memory => None,
		};

		Ok(Cache {
			memory,
			disk,
			default_ttl: Duration::from_secs(settings.ttl_secs),
			sealing,
			stats: Stats::default(),
		})
	}

	/// Memory-only cache, used when no configuration is available
	pub fn in_memory() -> Self {
		Cache {
			memory: Some(MemoryTier::new(1024, 64 * 1024 * 1024)),
			disk: None,
			default_ttl: Duration::from_secs(900),
			sealing: false,
			stats: Stats::default(),
		}
	}

	/// Fetch a live value
	pub fn get(&self, key: &str) -> Option<CachedValue> {
		self.stats.gets.fetch_add(1, Ordering::Relaxed);

		if let Some(memory) = &self.memory {
			if let Some(entry) = memory.get(key) {
				self.stats.hits.fetch_add(1, Ordering::Relaxed);
				return Some(entry.value);
			}
		}

		if let Some(disk) = &self.disk {
			if let Some(entry) = disk.get(key) {
				// Promote into the memory tier
				if let Some(memory) = &self.memory {
					memory.set(entry.clone());
				}
				self.stats.hits.fetch_add(1, Ordering::Relaxed);
				return Some(entry.value);
			}
		}

		self.stats.misses.fetch_add(1, Ordering::Relaxed);
		None
	}

	/// Store a value under the default TTL
	pub fn set(&self, key: &str, value: CachedValue) {
		self.set_with_ttl(key, value, self.default_ttl, BTreeMap::new())
	}

	/// Store a value with an explicit TTL and metadata
	///
	/// The entry is sealed on disk when sealing is configured and either
	/// `metadata.sensitive` is `"true"` or the key itself looks
	/// sensitive.
	pub fn set_with_ttl(
		&self,
		key: &str,
		value: CachedValue,
		ttl: Duration,
		metadata: BTreeMap<String, String>,
	) {
		self.stats.puts.fetch_add(1, Ordering::Relaxed);

		let sensitive = metadata.get("sensitive").map(|v| v == "true").unwrap_or(false)
			|| is_sensitive_name(key);
		let mut entry = CacheEntry::new(key, value, ttl);
		entry.metadata = metadata;
		entry.encrypted = self.sealing && sensitive;

		if let Some(memory) = &self.memory {
			memory.set(entry.clone());
		}
		if let Some(disk) = &self.disk {
			if let Err(err) = disk.set(&entry) {
				warn!(key, error = %err, "disk cache write failed");
			}
		}
	}

	/// Fetch, or generate and store on a miss
	///
	/// Generator errors are returned unwrapped. Concurrent callers may
	/// both run the generator; there is no single-flight guard.
	pub async fn get_or_set<F, Fut>(
		&self,
		key: &str,
		ttl: Duration,
		generator: F,
	) -> EnvyResult<CachedValue>
	where
		F: FnOnce() -> Fut,
		Fut: std::future::Future<Output = EnvyResult<CachedValue>>,
	{
		if let Some(value) = self.get(key) {
			return Ok(value);
		}
		let value = generator().await?;
		self.set_with_ttl(key, value.clone(), ttl, BTreeMap::new());
		Ok(value)
	}

	/// Drop one entry from every tier
	pub fn remove(&self, key: &str) {
		if let Some(memory) = &self.memory {
			memory.remove(key);
		}
		if let Some(disk) = &self.disk {
			disk.remove(key);
		}
	}

	/// Empty both tiers and reset statistics
	pub fn clear(&self) {
		if let Some(memory) = &self.memory {
			memory.clear();
		}
		if let Some(disk) = &self.disk {
			disk.clear();
		}
		self.stats.hits.store(0, Ordering::Relaxed);
		self.stats.misses.store(0, Ordering::Relaxed);
		self.stats.gets.store(0, Ordering::Relaxed);
		self.stats.puts.store(0, Ordering::Relaxed);
	}

	/// Remove expired entries from both tiers
	pub fn purge_expired(&self) -> usize {
		let mut removed = 0;
		if let Some(memory) = &self.memory {
			removed += memory.purge_expired();
		}
		if let Some(disk) = &self.disk {
			removed += disk.purge_expired();
		}
		removed
	}

	/// Current statistics
	pub fn stats(&self) -> CacheStatsSnapshot {
		let hits = self.stats.hits.load(Ordering::Relaxed);
		let misses = self.stats.misses.load(Ordering::Relaxed);
		let accesses = hits + misses;

		let mut entries = 0;
		let mut size_bytes = 0u64;
		if let Some(memory) = &self.memory {
			entries += memory.len();
			size_bytes += memory.bytes() as u64;
		}
		if let Some(disk) = &self.disk {
			let (count, bytes) = disk.usage();
			entries += count;
			size_bytes += bytes;
		}

		CacheStatsSnapshot {
			hits,
			misses,
			gets: self.stats.gets.load(Ordering::Relaxed),
			puts: self.stats.puts.load(Ordering::Relaxed),
			entries,
			size_bytes,
			hit_rate: if accesses == 0 { 0.0 } else { hits as f64 / accesses as f64 },
		}
	}

	/// Start the periodic expiry sweeper
	///
	/// Runs until the token is cancelled. The handle is detached by
	/// callers that do not care about shutdown ordering.
	pub fn spawn_sweeper(
		self: &Arc<Self>,
		cancel: CancellationToken,
	) -> tokio::task::JoinHandle<()> {
		let cache = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
			ticker.tick().await;
			loop {
				tokio::select! {
					_ = cancel.cancelled() => break,
					_ = ticker.tick() => {
						let removed = cache.purge_expired();
						if removed > 0 {
							debug!(removed, "cache sweep removed expired entries");
						}
					}
				}
			}
		})
	}
}

/// Derive a cache key from a prefix and parts
///
/// The key is the first 16 hex characters of the SHA-256 over the
/// concatenated inputs, prefixed for readability.
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(prefix.as_bytes());
	for part in parts {
		hasher.update(part.as_bytes());
	}
	format!("{}:{}", prefix, &hex::encode(hasher.finalize())[..16])
}

/// Cache key for a parsed file, invalidated by modification
///
/// The key covers `(path, mtime, size)` so a touched or rewritten file
/// produces a different key and the stale parse is simply never hit
/// again.
pub fn file_cache_key(path: impl AsRef<Path>) -> EnvyResult<String> {
	let path = path.as_ref();
	let meta = fs::metadata(path).map_err(|e| file_read_error(path.display(), e))?;
	let mtime = meta
		.modified()
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.map(|d| d.as_secs())
		.unwrap_or(0);
	Ok(cache_key(
		"envfile",
		&[&path.display().to_string(), &mtime.to_string(), &meta.len().to_string()],
	))
}

/// Default cache directory (`$XDG_CACHE_HOME/envy` or `~/.cache/envy`)
pub fn default_cache_dir() -> PathBuf {
	if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
		if !xdg.is_empty() {
			return PathBuf::from(xdg).join("envy");
		}
	}
	match std::env::var("HOME") {
		Ok(home) => PathBuf::from(home).join(".cache").join("envy"),
		Err(_) => PathBuf::from(".envy-cache"),
	}
}


// vim: ts=4
