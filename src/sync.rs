//! Synchronization engine - push/pull/list/diff orchestration
//!
//! The engine resolves an environment from the project configuration,
//! builds the matching remote store, and drives bulk operations through
//! the worker pool behind the backend's rate limiter. Remote reads are
//! memoized in the cache; every remote call runs under the backend's
//! retry policy.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::entry::CachedValue;
use crate::cache::{cache_key, Cache};
use crate::config::{Environment, Project};
use crate::diff::{diff, DiffResult};
use crate::envfile::EnvFile;
use crate::error::{EnvyError, EnvyResult, ErrorKind};
use crate::parallel::{
	write_profile, BatchProcessor, PoolOptions, ProgressTracker, RateLimiter,
};
use crate::remote::{
	infer_key_type, retry_policy, store_for_environment, RemoteStore,
};
use crate::retry::{retry, RetryPolicy};

/// How long pulled remote snapshots stay cached
pub const REMOTE_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Options for a push
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
	/// Environment name; the project default when absent
	pub environment: Option<String>,
	/// Remote path prefix override
	pub prefix: Option<String>,
	/// Only push these variables
	pub variables: Option<Vec<String>>,
	/// Overwrite existing remote values
	pub force: bool,
	/// Plan only, change nothing
	pub dry_run: bool,
	/// Compute the local/remote diff before pushing
	pub show_diff: bool,
	/// Drop variables with empty values
	pub skip_empty: bool,
	/// Accept duplicate keys in the local files (last value wins)
	pub allow_duplicate: bool,
}

/// Options for a pull
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
	pub environment: Option<String>,
	/// Remote path prefix override
	pub prefix: Option<String>,
	/// Write the result to the environment's primary file
	pub write: bool,
}

/// What a push did (or would do, for a dry run)
#[derive(Debug, Clone)]
pub struct PushSummary {
	pub environment: String,
	pub total: usize,
	pub pushed: usize,
	pub diff: Option<DiffResult>,
	pub dry_run: bool,
}

/// What a pull produced
#[derive(Debug, Clone)]
pub struct PullResult {
	pub environment: String,
	pub file: EnvFile,
	pub written: Option<PathBuf>,
}

/// Which side of a listing to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
	Local,
	Remote,
	Both,
}

/// Where a listed key exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLocation {
	LocalOnly,
	RemoteOnly,
	Both,
}

/// One row of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
	pub local: Option<String>,
	pub remote: Option<String>,
	pub location: ListLocation,
}

/// One side of a diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSide {
	/// The merged local files of the selected environment
	Local,
	/// The remote snapshot of the selected environment
	Remote,
	/// The remote snapshot of a named environment
	Environment(String),
}

impl DiffSide {
	/// Parse a CLI-side argument
	pub fn parse(side: &str) -> DiffSide {
		match side {
			"local" => DiffSide::Local,
			"remote" => DiffSide::Remote,
			name => DiffSide::Environment(name.to_string()),
		}
	}
}

/// Push/pull/list/diff over one project
pub struct SyncEngine {
	project: Project,
	cache: Arc<Cache>,
	cache_enabled: bool,
	cancel: CancellationToken,
	store_override: Option<Arc<dyn RemoteStore>>,
}

impl SyncEngine {
	/// Build an engine from a loaded project
	pub fn new(project: Project) -> EnvyResult<Self> {
		let cache_enabled = project.cache.enabled;
		let cache = Arc::new(if cache_enabled {
			Cache::new(&project.cache)?
		} else {
			Cache::in_memory()
		});
		Ok(SyncEngine {
			project,
			cache,
			cache_enabled,
			cancel: CancellationToken::new(),
			store_override: None,
		})
	}

	/// Use a pre-built store for every environment (tests, offline runs)
	pub fn with_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
		self.store_override = Some(store);
		self
	}

	/// Disable cache reads and writes for this engine
	pub fn without_cache(mut self) -> Self {
		self.cache_enabled = false;
		self
	}

	/// Token cancelling every pending operation of this engine
	pub fn cancellation(&self) -> CancellationToken {
		self.cancel.clone()
	}

	pub fn cache(&self) -> &Arc<Cache> {
		&self.cache
	}

	pub fn project(&self) -> &Project {
		&self.project
	}

	fn store_for(&self, environment: &Environment) -> EnvyResult<Arc<dyn RemoteStore>> {
		match &self.store_override {
			Some(store) => Ok(Arc::clone(store)),
			None => store_for_environment(&self.project, environment),
		}
	}

	/// Push local variables to the remote
	pub async fn push(&self, options: &PushOptions) -> EnvyResult<PushSummary> {
		let (env_name, environment) =
			self.project.environment(options.environment.as_deref())?;
		let path = options.prefix.clone().unwrap_or_else(|| environment.path.clone());
		let store = self.store_for(environment)?;

		// Load and merge the environment's files, later files override
		let (mut merged, duplicates) = load_merged(&environment.files)?;

		if let Some(wanted) = &options.variables {
			let unwanted: Vec<String> = merged
				.keys()
				.filter(|k| !wanted.contains(k))
				.cloned()
				.collect();
			for key in unwanted {
				merged.delete(&key);
			}
		}

		// Only duplicates that survived the variable filter count
		let duplicates: Vec<String> = duplicates
			.into_iter()
			.filter(|key| merged.get(key).is_some())
			.collect();
		if !duplicates.is_empty() {
			if options.allow_duplicate {
				warn!(environment = env_name, keys = ?duplicates, "duplicate variables found, last value wins");
			} else {
				return Err(EnvyError::new(
					ErrorKind::ValidationFailed,
					format!("Duplicate variables found: {}", duplicates.join(", ")),
				)
				.with_detail("environment", env_name.to_string()));
			}
		}

		if options.skip_empty {
			let empty: Vec<String> = merged
				.iter()
				.filter(|v| v.value.is_empty())
				.map(|v| v.key.clone())
				.collect();
			for key in empty {
				merged.delete(&key);
			}
		}

		let local_map = merged.to_map();
		let change = if options.show_diff || options.dry_run {
			let remote_map = self.remote_snapshot(env_name, environment, &path).await?;
			Some(diff(&remote_map, &local_map))
		} else {
			None
		};

		if options.dry_run {
			info!(environment = env_name, total = local_map.len(), "dry run, nothing pushed");
			return Ok(PushSummary {
				environment: env_name.to_string(),
				total: local_map.len(),
				pushed: 0,
				diff: change,
				dry_run: true,
			});
		}

		let total = local_map.len();
		let pushed = self
			.push_keys(&store, &path, &local_map, options.force)
			.await?;

		// The remote changed under this prefix; drop the stale snapshot
		self.cache.remove(&remote_cache_key(&path));

		info!(environment = env_name, pushed, total, "push complete");
		Ok(PushSummary {
			environment: env_name.to_string(),
			total,
			pushed,
			diff: change,
			dry_run: false,
		})
	}

	/// Fan per-key puts out in batches behind the rate limiter
	///
	/// Each key becomes one item; items are grouped into `batch_size`
	/// batches over the pool. Retries run per item around the put, so
	/// a failed item is final when it lands in the failure list.
	async fn push_keys(
		&self,
		store: &Arc<dyn RemoteStore>,
		path: &str,
		values: &BTreeMap<String, String>,
		overwrite: bool,
	) -> EnvyResult<usize> {
		let perf = &self.project.performance;
		let profile = if perf.rate > 0 && perf.burst > 0 {
			crate::parallel::RateProfile { rate: perf.rate, burst: perf.burst }
		} else {
			write_profile(store.backend())
		};
		let limiter = Arc::new(RateLimiter::new(profile.rate, profile.burst));
		let policy = retry_policy(store.backend());
		let progress = Arc::new(ProgressTracker::new(0));
		let failures: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

		let processor = BatchProcessor::new(perf.batch_size)
			// Attempts are managed around each put below; a process
			// failure is already final
			.with_policy(RetryPolicy::none())
			.with_options(PoolOptions {
				workers: perf.max_workers,
				queue_capacity: perf.max_workers * 4,
				task_timeout: Some(Duration::from_secs(perf.task_timeout_secs)),
				rate_interval: None,
			});

		let items: Vec<(String, String)> =
			values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
		let total = items.len();

		let push_store = Arc::clone(store);
		let push_path = path.to_string();
		let push_failures = Arc::clone(&failures);
		processor
			.run(
				items,
				&self.cancel,
				Some(Arc::clone(&progress)),
				move |token, (name, value): (String, String)| {
					let store = Arc::clone(&push_store);
					let limiter = Arc::clone(&limiter);
					let policy = policy.clone();
					let failures = Arc::clone(&push_failures);
					let full_path = format!("{}{}", push_path, name);
					let kind = infer_key_type(&name);
					async move {
						limiter.wait(&token).await?;
						let op_token = token.clone();
						let result = retry(&policy, &token, move |_| {
							let store = Arc::clone(&store);
							let full_path = full_path.clone();
							let value = value.clone();
							let token = op_token.clone();
							async move {
								if token.is_cancelled() {
									return Err(EnvyError::new(
										ErrorKind::Timeout,
										"Push cancelled",
									)
									.retriable(true));
								}
								store.put(&full_path, &value, kind, overwrite).await
							}
						})
						.await;

						if let Err(err) = &result {
							debug!(key = name, error = %err, "put failed");
							failures.lock().unwrap_or_else(|e| e.into_inner()).push(name.clone());
						}
						result
					}
				},
			)
			.await?;

		let snapshot = progress.snapshot();
		debug!(completed = snapshot.completed, failed = snapshot.failed, "push fan-out finished");

		let mut failed = {
			let guard = failures.lock().unwrap_or_else(|e| e.into_inner());
			guard.clone()
		};
		if !failed.is_empty() {
			failed.sort();
			return Err(EnvyError::new(
				ErrorKind::Internal,
				format!("Push failed for {} keys: {}", failed.len(), failed.join(", ")),
			)
			.with_detail("failed", failed.join(",")));
		}
		Ok(total)
	}

	/// Pull the remote snapshot into an env file
	pub async fn pull(&self, options: &PullOptions) -> EnvyResult<PullResult> {
		let (env_name, environment) =
			self.project.environment(options.environment.as_deref())?;
		let path = options.prefix.clone().unwrap_or_else(|| environment.path.clone());

		let map = self.remote_snapshot(env_name, environment, &path).await?;
		let mut file = EnvFile::new();
		for (name, value) in &map {
			file.set(name.clone(), value.clone());
		}

		let written = if options.write {
			let target = environment.primary_file().map(|p| p.to_path_buf()).ok_or_else(|| {
				EnvyError::new(
					ErrorKind::ConfigInvalid,
					format!("Environment '{}' has no files configured", env_name),
				)
			})?;
			file.write(&target)?;
			info!(environment = env_name, file = %target.display(), keys = map.len(), "pull written");
			Some(target)
		} else {
			None
		};

		Ok(PullResult { environment: env_name.to_string(), file, written })
	}

	/// List variables of an environment
	pub async fn list(
		&self,
		environment: Option<&str>,
		source: ListSource,
	) -> EnvyResult<BTreeMap<String, ListEntry>> {
		let (env_name, env) = self.project.environment(environment)?;

		let local = match source {
			ListSource::Remote => BTreeMap::new(),
			_ => load_merged(&env.files)?.0.to_map(),
		};
		let remote = match source {
			ListSource::Local => BTreeMap::new(),
			_ => self.remote_snapshot(env_name, env, &env.path).await?,
		};

		let mut entries = BTreeMap::new();
		for (name, value) in &local {
			entries.insert(
				name.clone(),
				ListEntry {
					local: Some(value.clone()),
					remote: None,
					location: ListLocation::LocalOnly,
				},
			);
		}
		for (name, value) in &remote {
			entries
				.entry(name.clone())
				.and_modify(|entry: &mut ListEntry| {
					entry.remote = Some(value.clone());
					entry.location = ListLocation::Both;
				})
				.or_insert(ListEntry {
					local: None,
					remote: Some(value.clone()),
					location: ListLocation::RemoteOnly,
				});
		}
		Ok(entries)
	}

	/// Diff two snapshots chosen by side
	pub async fn diff(
		&self,
		from: &DiffSide,
		to: &DiffSide,
		environment: Option<&str>,
	) -> EnvyResult<DiffResult> {
		let from_map = self.snapshot(from, environment).await?;
		let to_map = self.snapshot(to, environment).await?;
		Ok(diff(&from_map, &to_map))
	}

	async fn snapshot(
		&self,
		side: &DiffSide,
		environment: Option<&str>,
	) -> EnvyResult<BTreeMap<String, String>> {
		match side {
			DiffSide::Local => {
				let (_, env) = self.project.environment(environment)?;
				Ok(load_merged(&env.files)?.0.to_map())
			}
			DiffSide::Remote => {
				let (name, env) = self.project.environment(environment)?;
				self.remote_snapshot(name, env, &env.path).await
			}
			DiffSide::Environment(name) => {
				let (name, env) = self.project.environment(Some(name))?;
				self.remote_snapshot(name, env, &env.path).await
			}
		}
	}

	/// The remote key/value snapshot under a prefix, cached for 15 min
	///
	/// Remote names are converted to local variable names: the prefix
	/// is stripped, `/` becomes `_`, and the result is upper-cased.
	async fn remote_snapshot(
		&self,
		env_name: &str,
		environment: &Environment,
		path: &str,
	) -> EnvyResult<BTreeMap<String, String>> {
		let key = remote_cache_key(path);
		if self.cache_enabled {
			if let Some(CachedValue::StringMap(map)) = self.cache.get(&key) {
				debug!(environment = env_name, "remote snapshot served from cache");
				return Ok(map);
			}
		}

		let store = self.store_for(environment)?;
		let policy = retry_policy(store.backend());
		let fetch_path = path.to_string();
		let fetch_store = Arc::clone(&store);
		let keys = retry(&policy, &self.cancel, move |_| {
			let store = Arc::clone(&fetch_store);
			let path = fetch_path.clone();
			async move { store.get_by_prefix(&path, true, true).await }
		})
		.await?;

		let mut map = BTreeMap::new();
		for key in keys {
			let name = local_name(&key.full_path(), path);
			map.insert(name, key.value);
		}

		if self.cache_enabled {
			self.cache.set_with_ttl(
				&key,
				CachedValue::StringMap(map.clone()),
				REMOTE_CACHE_TTL,
				BTreeMap::new(),
			);
		}
		Ok(map)
	}
}

fn remote_cache_key(path: &str) -> String {
	cache_key("remote", &[path])
}

/// Convert a full remote path into a local variable name
fn local_name(full_path: &str, prefix: &str) -> String {
	let rel = full_path.strip_prefix(prefix).unwrap_or(full_path);
	rel.replace('/', "_").to_uppercase()
}

/// Merge an environment's files in order, later files winning
///
/// Missing files fail the operation; empty files are ignored. Returns
/// the merged file plus every duplicate-key signal from the individual
/// parses.
fn load_merged(files: &[PathBuf]) -> EnvyResult<(EnvFile, Vec<String>)> {
	let mut merged = EnvFile::new();
	let mut duplicates = Vec::new();
	for path in files {
		let file = EnvFile::load(path)?;
		for key in file.duplicates() {
			if !duplicates.contains(key) {
				duplicates.push(key.clone());
			}
		}
		if file.is_empty() {
			continue;
		}
		merged.merge(&file);
	}
	Ok((merged, duplicates))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{CacheKind, CacheSettings};
	use crate::remote::MemoryStore;
	use std::fs;
	use tempfile::TempDir;

	fn project_with_env(files: Vec<PathBuf>) -> Project {
		let mut project = Project {
			name: "app".to_string(),
			default_environment: "dev".to_string(),
			cache: CacheSettings {
				kind: CacheKind::Memory,
				..Default::default()
			},
			..Default::default()
		};
		project.environments.insert(
			"dev".to_string(),
			Environment { files, path: "/app/dev/".to_string(), use_secret_store: false },
		);
		project
	}

	fn engine_with_memory(project: Project) -> (SyncEngine, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::new());
		let engine = SyncEngine::new(project)
			.unwrap()
			.with_store(Arc::clone(&store) as Arc<dyn RemoteStore>);
		(engine, store)
	}

	#[tokio::test]
	async fn test_push_and_pull_roundtrip() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "A=1\nDB_PASSWORD=hunter2\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);

		let summary = engine.push(&PushOptions::default()).await.unwrap();
		assert_eq!(summary.pushed, 2);
		assert_eq!(summary.total, 2);

		let snapshot = store.snapshot();
		assert_eq!(snapshot.get("/app/dev/A").map(String::as_str), Some("1"));
		assert_eq!(
			snapshot.get("/app/dev/DB_PASSWORD").map(String::as_str),
			Some("hunter2")
		);

		let pulled = engine.pull(&PullOptions::default()).await.unwrap();
		assert_eq!(pulled.file.get("A"), Some("1"));
		assert_eq!(pulled.file.get("DB_PASSWORD"), Some("hunter2"));
	}

	#[tokio::test]
	async fn test_push_duplicates_rejected_without_flag() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "A=1\nA=2\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);

		let err = engine.push(&PushOptions::default()).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::ValidationFailed);
		assert!(format!("{}", err).contains("Duplicate variables found"));
		assert!(store.snapshot().is_empty());

		let summary = engine
			.push(&PushOptions { allow_duplicate: true, ..Default::default() })
			.await
			.unwrap();
		assert_eq!(summary.pushed, 1);
		assert_eq!(
			store.snapshot().get("/app/dev/A").map(String::as_str),
			Some("2")
		);
	}

	#[tokio::test]
	async fn test_filtered_out_duplicate_does_not_fail_push() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "FOO=1\nBAZ=old\nBAZ=new\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);

		// BAZ is duplicated but excluded by the filter, so the push
		// succeeds without --allow-duplicate
		let summary = engine
			.push(&PushOptions {
				variables: Some(vec!["FOO".to_string()]),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(summary.pushed, 1);

		let snapshot = store.snapshot();
		assert_eq!(snapshot.get("/app/dev/FOO").map(String::as_str), Some("1"));
		assert!(!snapshot.contains_key("/app/dev/BAZ"));

		// A duplicate inside the wanted set still fails
		let err = engine
			.push(&PushOptions {
				variables: Some(vec!["BAZ".to_string()]),
				force: true,
				..Default::default()
			})
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::ValidationFailed);
	}

	#[tokio::test]
	async fn test_push_skip_empty_and_filter() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "A=1\nB=\nC=3\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);

		engine
			.push(&PushOptions {
				skip_empty: true,
				variables: Some(vec!["A".to_string(), "B".to_string()]),
				..Default::default()
			})
			.await
			.unwrap();

		let snapshot = store.snapshot();
		assert_eq!(snapshot.len(), 1);
		assert!(snapshot.contains_key("/app/dev/A"));
	}

	#[tokio::test]
	async fn test_push_dry_run_changes_nothing() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "A=1\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);

		let summary = engine
			.push(&PushOptions { dry_run: true, ..Default::default() })
			.await
			.unwrap();
		assert!(summary.dry_run);
		assert_eq!(summary.pushed, 0);
		let change = summary.diff.unwrap();
		assert_eq!(change.added.len(), 1);
		assert!(store.snapshot().is_empty());
	}

	#[tokio::test]
	async fn test_push_merges_files_in_order() {
		let dir = TempDir::new().unwrap();
		let base = dir.path().join(".env");
		let over = dir.path().join(".env.dev");
		fs::write(&base, "A=base\nB=base\n").unwrap();
		fs::write(&over, "B=dev\n").unwrap();

		let project = project_with_env(vec![base, over]);
		let (engine, store) = engine_with_memory(project);

		engine.push(&PushOptions::default()).await.unwrap();
		let snapshot = store.snapshot();
		assert_eq!(snapshot.get("/app/dev/A").map(String::as_str), Some("base"));
		assert_eq!(snapshot.get("/app/dev/B").map(String::as_str), Some("dev"));
	}

	#[tokio::test]
	async fn test_list_both_annotates_location() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "SHARED=local\nLOCAL_ONLY=1\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);
		store
			.put("/app/dev/SHARED", "remote", crate::remote::KeyType::Plain, true)
			.await
			.unwrap();
		store
			.put("/app/dev/REMOTE_ONLY", "2", crate::remote::KeyType::Plain, true)
			.await
			.unwrap();

		let entries = engine.list(None, ListSource::Both).await.unwrap();
		assert_eq!(entries["SHARED"].location, ListLocation::Both);
		assert_eq!(entries["LOCAL_ONLY"].location, ListLocation::LocalOnly);
		assert_eq!(entries["REMOTE_ONLY"].location, ListLocation::RemoteOnly);
		assert_eq!(entries["SHARED"].local.as_deref(), Some("local"));
		assert_eq!(entries["SHARED"].remote.as_deref(), Some("remote"));
	}

	#[tokio::test]
	async fn test_diff_local_vs_remote() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "K1=v1\nK2=v3\nK3=v4\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);
		store.put("/app/dev/K1", "v1", crate::remote::KeyType::Plain, true).await.unwrap();
		store.put("/app/dev/K2", "v2", crate::remote::KeyType::Plain, true).await.unwrap();

		let change = engine
			.diff(&DiffSide::Remote, &DiffSide::Local, None)
			.await
			.unwrap();
		assert_eq!(change.added.len(), 1);
		assert!(change.added.contains_key("K3"));
		assert_eq!(
			change.modified.get("K2"),
			Some(&("v2".to_string(), "v3".to_string()))
		);
		assert_eq!(change.unchanged.len(), 1);
		assert!(change.deleted.is_empty());
	}

	#[tokio::test]
	async fn test_pull_writes_primary_file_with_nested_names() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "").unwrap();

		let project = project_with_env(vec![env_path.clone()]);
		let (engine, store) = engine_with_memory(project);
		store
			.put("/app/dev/db/url", "postgres://x", crate::remote::KeyType::Plain, true)
			.await
			.unwrap();

		let result = engine
			.pull(&PullOptions { write: true, ..Default::default() })
			.await
			.unwrap();
		assert_eq!(result.written.as_deref(), Some(env_path.as_path()));

		let written = EnvFile::load(&env_path).unwrap();
		assert_eq!(written.get("DB_URL"), Some("postgres://x"));
	}

	#[tokio::test]
	async fn test_push_failure_lists_failed_keys() {
		let dir = TempDir::new().unwrap();
		let env_path = dir.path().join(".env");
		fs::write(&env_path, "A=1\nB=2\n").unwrap();

		let project = project_with_env(vec![env_path]);
		let (engine, store) = engine_with_memory(project);
		// Pre-existing key and no --force: that put must fail
		store.put("/app/dev/A", "old", crate::remote::KeyType::Plain, true).await.unwrap();

		let err = engine.push(&PushOptions::default()).await.unwrap_err();
		let message = format!("{}", err);
		assert!(message.contains("Push failed for 1 keys"));
		assert!(message.contains("A"));

		// With force both keys land
		let summary = engine
			.push(&PushOptions { force: true, ..Default::default() })
			.await
			.unwrap();
		assert_eq!(summary.pushed, 2);
	}
}

// vim: ts=4
