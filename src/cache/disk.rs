//! On-disk cache tier
//!
//! One file per key. The file name is the hex SHA-256 of the key split
//! as `hh/rest.cache` to bound directory fanout. Directories are 0700,
//! files 0600; a read whose file mode is not exactly 0600 is rejected
//! and the file deleted. Writes go to a `.tmp` sibling and are renamed
//! into place.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::encryption::Sealer;
use super::entry::CacheEntry;
use crate::error::{file_write_error, EnvyResult};

/// File-per-key disk tier
#[derive(Debug)]
pub struct DiskTier {
	dir: PathBuf,
	sealer: Option<Sealer>,
	// Guards multi-step filesystem sequences (check perms, read, delete)
	lock: Mutex<()>,
}

impl DiskTier {
	/// Open or create the cache directory
	pub fn new(dir: PathBuf, sealer: Option<Sealer>) -> EnvyResult<Self> {
		fs::create_dir_all(&dir).map_err(|e| file_write_error(dir.display(), e))?;
		set_dir_mode(&dir)?;
		Ok(DiskTier { dir, sealer, lock: Mutex::new(()) })
	}

	fn path_for(&self, key: &str) -> PathBuf {
		let digest = hex::encode(Sha256::digest(key.as_bytes()));
		self.dir.join(&digest[..2]).join(format!("{}.cache", &digest[2..]))
	}

	/// Read a live entry
	pub fn get(&self, key: &str) -> Option<CacheEntry> {
		let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
		let path = self.path_for(key);
		if !path.is_file() {
			return None;
		}

		if !mode_is_0600(&path) {
			warn!(path = %path.display(), "cache file has unsafe permissions, removing");
			let _ = fs::remove_file(&path);
			return None;
		}

		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(err) => {
				debug!(path = %path.display(), error = %err, "cache read failed");
				return None;
			}
		};

		let entry = match self.decode(&bytes) {
			Some(entry) => entry,
			None => {
				debug!(path = %path.display(), "corrupt cache file, removing");
				let _ = fs::remove_file(&path);
				return None;
			}
		};

		if entry.is_expired() {
			let _ = fs::remove_file(&path);
			return None;
		}

		let mut entry = entry;
		entry.touch();
		Some(entry)
	}

	/// Decode envelope bytes, with the mixed-state fallback
	///
	/// When a sealer is configured, opening is tried first; bytes that
	/// fail to open are then parsed as plain JSON so stores written
	/// before encryption was enabled remain readable.
	fn decode(&self, bytes: &[u8]) -> Option<CacheEntry> {
		if let Some(sealer) = &self.sealer {
			if let Ok(plain) = sealer.open(bytes) {
				return serde_json::from_slice(&plain).ok();
			}
		}
		serde_json::from_slice(bytes).ok()
	}

	/// Write an entry atomically
	pub fn set(&self, entry: &CacheEntry) -> EnvyResult<()> {
		let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
		let path = self.path_for(&entry.key);
		let parent = path.parent().expect("cache paths always have a parent");

		fs::create_dir_all(parent).map_err(|e| file_write_error(parent.display(), e))?;
		set_dir_mode(parent)?;

		let json = serde_json::to_vec(entry)
			.map_err(|e| crate::error::EnvyError::wrap(
				crate::error::ErrorKind::Internal,
				"Failed to serialize cache entry",
				e,
			))?;
		let bytes = match (&self.sealer, entry.encrypted) {
			(Some(sealer), true) => sealer.seal(&json)?,
			_ => json,
		};

		let tmp = path.with_extension("tmp");
		write_0600(&tmp, &bytes)?;
		fs::rename(&tmp, &path).map_err(|e| file_write_error(path.display(), e))?;
		Ok(())
	}

	/// Delete an entry; absence is not an error
	pub fn remove(&self, key: &str) -> bool {
		let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
		fs::remove_file(self.path_for(key)).is_ok()
	}

	/// Delete every cache file
	pub fn clear(&self) {
		let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
		for subdir in read_dirs(&self.dir) {
			let _ = fs::remove_dir_all(&subdir);
		}
	}

	/// Delete expired and corrupt files; returns how many were removed
	pub fn purge_expired(&self) -> usize {
		let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
		let mut removed = 0;
		for file in self.cache_files() {
			let stale = match fs::read(&file) {
				Ok(bytes) => match self.decode(&bytes) {
					Some(entry) => entry.is_expired(),
					None => true,
				},
				Err(_) => true,
			};
			if stale && fs::remove_file(&file).is_ok() {
				removed += 1;
			}
		}
		removed
	}

	/// Number of cache files and their total size
	pub fn usage(&self) -> (usize, u64) {
		let mut count = 0;
		let mut bytes = 0;
		for file in self.cache_files() {
			if let Ok(meta) = fs::metadata(&file) {
				count += 1;
				bytes += meta.len();
			}
		}
		(count, bytes)
	}

	fn cache_files(&self) -> Vec<PathBuf> {
		let mut files = Vec::new();
		for subdir in read_dirs(&self.dir) {
			if let Ok(entries) = fs::read_dir(&subdir) {
				for entry in entries.flatten() {
					let path = entry.path();
					if path.extension().map(|e| e == "cache").unwrap_or(false) {
						files.push(path);
					}
				}
			}
		}
		files
	}
}

fn read_dirs(dir: &Path) -> Vec<PathBuf> {
	let mut dirs = Vec::new();
	if let Ok(entries) = fs::read_dir(dir) {
		for entry in entries.flatten() {
			let path = entry.path();
			if path.is_dir() {
				dirs.push(path);
			}
		}
	}
	dirs
}

#[cfg(unix)]
fn set_dir_mode(dir: &Path) -> EnvyResult<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
		.map_err(|e| file_write_error(dir.display(), e))
}

#[cfg(not(unix))]
fn set_dir_mode(_dir: &Path) -> EnvyResult<()> {
	Ok(())
}

#[cfg(unix)]
fn mode_is_0600(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	fs::metadata(path)
		.map(|m| m.permissions().mode() & 0o777 == 0o600)
		.unwrap_or(false)
}

#[cfg(not(unix))]
fn mode_is_0600(_path: &Path) -> bool {
	true
}

#[cfg(unix)]
fn write_0600(path: &Path, bytes: &[u8]) -> EnvyResult<()> {
	use std::os::unix::fs::OpenOptionsExt;
	let mut file = fs::OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.mode(0o600)
		.open(path)
		.map_err(|e| file_write_error(path.display(), e))?;
	file.write_all(bytes).map_err(|e| file_write_error(path.display(), e))
}

#[cfg(not(unix))]
fn write_0600(path: &Path, bytes: &[u8]) -> EnvyResult<()> {
	fs::write(path, bytes).map_err(|e| file_write_error(path.display(), e))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::entry::CachedValue;
	use std::time::Duration;
	use tempfile::TempDir;

	fn entry(key: &str, value: &str, ttl: Duration) -> CacheEntry {
		CacheEntry::new(key, CachedValue::Generic(serde_json::json!(value)), ttl)
	}

	#[test]
	fn test_set_get_roundtrip() {
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		tier.set(&entry("k", "v", Duration::from_secs(60))).unwrap();

		let got = tier.get("k").unwrap();
		assert_eq!(got.key, "k");
		assert!(tier.get("missing").is_none());
	}

	#[test]
	fn test_fanout_layout() {
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		tier.set(&entry("k", "v", Duration::from_secs(60))).unwrap();

		let subdirs = read_dirs(dir.path());
		assert_eq!(subdirs.len(), 1);
		let name = subdirs[0].file_name().unwrap().to_str().unwrap().to_string();
		assert_eq!(name.len(), 2);
	}

	#[cfg(unix)]
	#[test]
	fn test_file_mode_is_0600() {
		use std::os::unix::fs::PermissionsExt;
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		tier.set(&entry("k", "v", Duration::from_secs(60))).unwrap();

		let file = tier.cache_files().pop().unwrap();
		let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
		assert_eq!(mode, 0o600);
	}

	#[cfg(unix)]
	#[test]
	fn test_unsafe_mode_rejected_and_removed() {
		use std::os::unix::fs::PermissionsExt;
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		tier.set(&entry("k", "v", Duration::from_secs(60))).unwrap();

		let file = tier.cache_files().pop().unwrap();
		fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

		assert!(tier.get("k").is_none());
		assert!(!file.exists());
	}

	#[test]
	fn test_expired_file_removed_on_read() {
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		let mut e = entry("k", "v", Duration::from_millis(10));
		e.created_at -= 100;
		tier.set(&e).unwrap();

		assert!(tier.get("k").is_none());
		assert_eq!(tier.usage().0, 0);
	}

	#[test]
	fn test_encrypted_bytes_are_not_plaintext() {
		let dir = TempDir::new().unwrap();
		let tier =
			DiskTier::new(dir.path().to_path_buf(), Some(Sealer::new("passphrase"))).unwrap();
		let mut e = entry("API_TOKEN", "super-secret-value", Duration::from_secs(60));
		e.encrypted = true;
		tier.set(&e).unwrap();

		let file = tier.cache_files().pop().unwrap();
		let raw = fs::read(&file).unwrap();
		assert!(!String::from_utf8_lossy(&raw).contains("super-secret-value"));

		let got = tier.get("API_TOKEN").unwrap();
		assert_eq!(got.value, CachedValue::Generic(serde_json::json!("super-secret-value")));
	}

	#[test]
	fn test_mixed_state_store_readable() {
		// Plaintext entry written without a sealer, read back with one
		let dir = TempDir::new().unwrap();
		let plain = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		plain.set(&entry("k", "v", Duration::from_secs(60))).unwrap();

		let sealed =
			DiskTier::new(dir.path().to_path_buf(), Some(Sealer::new("passphrase"))).unwrap();
		assert!(sealed.get("k").is_some());
	}

	#[test]
	fn test_purge_removes_corrupt_files() {
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		tier.set(&entry("good", "v", Duration::from_secs(60))).unwrap();

		let sub = dir.path().join("zz");
		fs::create_dir_all(&sub).unwrap();
		fs::write(sub.join("junk.cache"), b"not json").unwrap();

		assert_eq!(tier.purge_expired(), 1);
		assert!(tier.get("good").is_some());
	}

	#[test]
	fn test_clear() {
		let dir = TempDir::new().unwrap();
		let tier = DiskTier::new(dir.path().to_path_buf(), None).unwrap();
		tier.set(&entry("a", "1", Duration::from_secs(60))).unwrap();
		tier.set(&entry("b", "2", Duration::from_secs(60))).unwrap();

		tier.clear();
		assert_eq!(tier.usage().0, 0);
	}
}

// vim: ts=4
