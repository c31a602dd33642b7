//! In-memory cache tier with LRU eviction
//!
//! Reads take the shared lock; a hit then briefly takes the exclusive
//! lock to bump `last_accessed`. Inserts evict the least-recently-used
//! entry while either the entry count or the estimated byte size is
//! over its cap.

use std::collections::HashMap;
use std::sync::RwLock;

use super::entry::CacheEntry;

#[derive(Debug, Default)]
struct Inner {
	entries: HashMap<String, CacheEntry>,
	bytes: usize,
}

/// Bounded LRU map of cache entries
#[derive(Debug)]
pub struct MemoryTier {
	inner: RwLock<Inner>,
	max_entries: usize,
	max_bytes: usize,
}

impl MemoryTier {
	pub fn new(max_entries: usize, max_bytes: usize) -> Self {
		MemoryTier {
			inner: RwLock::new(Inner::default()),
			max_entries: max_entries.max(1),
			max_bytes: max_bytes.max(1),
		}
	}

	/// Fetch a live entry, bumping its access time
	pub fn get(&self, key: &str) -> Option<CacheEntry> {
		{
			let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
			match inner.entries.get(key) {
				Some(entry) if !entry.is_expired() => {}
				_ => return None,
			}
		}

		let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
		match inner.entries.get_mut(key) {
			Some(entry) if !entry.is_expired() => {
				entry.touch();
				Some(entry.clone())
			}
			_ => None,
		}
	}

	/// Insert or replace an entry, evicting as needed
	pub fn set(&self, entry: CacheEntry) {
		let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
		let size = entry.estimated_size();

		if let Some(old) = inner.entries.remove(&entry.key) {
			inner.bytes = inner.bytes.saturating_sub(old.estimated_size());
		}

		while !inner.entries.is_empty()
			&& (inner.entries.len() >= self.max_entries
				|| inner.bytes + size > self.max_bytes)
		{
			let oldest = inner
				.entries
				.values()
				.min_by_key(|e| e.last_accessed)
				.map(|e| e.key.clone());
			match oldest {
				Some(key) => {
					if let Some(evicted) = inner.entries.remove(&key) {
						inner.bytes = inner.bytes.saturating_sub(evicted.estimated_size());
					}
				}
				None => break,
			}
		}

		inner.bytes += size;
		inner.entries.insert(entry.key.clone(), entry);
	}

	pub fn remove(&self, key: &str) -> bool {
		let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
		match inner.entries.remove(key) {
			Some(old) => {
				inner.bytes = inner.bytes.saturating_sub(old.estimated_size());
				true
			}
			None => false,
		}
	}

	pub fn clear(&self) {
		let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
		inner.entries.clear();
		inner.bytes = 0;
	}

	/// Drop expired entries; returns how many were removed
	pub fn purge_expired(&self) -> usize {
		let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
		let expired: Vec<String> = inner
			.entries
			.values()
			.filter(|e| e.is_expired())
			.map(|e| e.key.clone())
			.collect();
		for key in &expired {
			if let Some(old) = inner.entries.remove(key) {
				inner.bytes = inner.bytes.saturating_sub(old.estimated_size());
			}
		}
		expired.len()
	}

	pub fn len(&self) -> usize {
		self.inner.read().unwrap_or_else(|e| e.into_inner()).entries.len()
	}

	pub fn bytes(&self) -> usize {
		self.inner.read().unwrap_or_else(|e| e.into_inner()).bytes
	}
}


// vim: ts=4
