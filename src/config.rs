//! Project configuration for envy
//!
//! A project is described by a single `envy.toml` discovered by walking
//! upward from the working directory. The file maps environment names to
//! the env files they merge and the remote path prefix they sync with.
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults
//! 2. Project file (envy.toml, nearest ancestor wins)
//! 3. Environment variables (ENVY_* prefix, `.` replaced by `_`)
//! 4. CLI flags (highest priority, applied by the caller)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// File name searched for during discovery
pub const CONFIG_FILE_NAME: &str = "envy.toml";

/// Environment-variable override prefix
pub const ENV_PREFIX: &str = "ENVY_";

/// Top-level project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
	/// Project name, used in remote path prefixes and display
	pub name: String,

	/// Environment used when none is given on the command line
	pub default_environment: String,

	/// Remote service identifier (host, or a full URL for self-hosted endpoints)
	pub backend_service: String,

	/// Service region, part of the derived endpoint host
	pub region: String,

	/// Credentials profile name
	pub profile: String,

	/// Explicit endpoint URL; overrides the derived one when set
	pub endpoint: Option<String>,

	/// Named environments
	pub environments: BTreeMap<String, Environment>,

	/// Cache tuning
	pub cache: CacheSettings,

	/// Parallelism and rate tuning
	pub performance: PerformanceSettings,
}

impl Default for Project {
	fn default() -> Self {
		Project {
			name: String::new(),
			default_environment: "development".to_string(),
			backend_service: "parameter-store".to_string(),
			region: "us-east-1".to_string(),
			profile: "default".to_string(),
			endpoint: None,
			environments: BTreeMap::new(),
			cache: CacheSettings::default(),
			performance: PerformanceSettings::default(),
		}
	}
}

/// One named environment of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Environment {
	/// Local env files, merged in order (later wins)
	pub files: Vec<PathBuf>,

	/// Remote path prefix this environment syncs under
	pub path: String,

	/// Store this environment in the secret store instead of per-key parameters
	pub use_secret_store: bool,
}

impl Default for Environment {
	fn default() -> Self {
		Environment { files: vec![PathBuf::from(".env")], path: String::new(), use_secret_store: false }
	}
}

impl Environment {
	/// The file pulls are written to (the first configured file)
	pub fn primary_file(&self) -> Option<&Path> {
		self.files.first().map(|p| p.as_path())
	}
}

/// Cache tier selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheKind {
	Memory,
	Disk,
	#[default]
	Hybrid,
}

/// Cache tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
	/// Whether remote reads and local parses are memoized
	pub enabled: bool,

	/// Tier selection
	pub kind: CacheKind,

	/// Cache directory (defaults to ~/.cache/envy)
	pub dir: Option<PathBuf>,

	/// Default entry TTL in seconds
	pub ttl_secs: u64,

	/// Memory-tier entry cap
	pub max_entries: usize,

	/// Memory-tier byte cap in MB
	pub max_size_mb: usize,

	/// Passphrase for sealing sensitive entries on disk
	pub encryption_key: Option<String>,
}

impl Default for CacheSettings {
	fn default() -> Self {
		CacheSettings {
			enabled: true,
			kind: CacheKind::Hybrid,
			dir: None,
			ttl_secs: 900,
			max_entries: 1024,
			max_size_mb: 64,
			encryption_key: None,
		}
	}
}

/// Parallelism and rate tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceSettings {
	/// Worker pool size
	pub max_workers: usize,

	/// Items per batch for bulk operations
	pub batch_size: usize,

	/// Token-bucket refill rate (tokens per second); 0 selects the backend profile
	pub rate: u32,

	/// Token-bucket capacity; 0 selects the backend profile
	pub burst: u32,

	/// Per-task timeout in seconds
	pub task_timeout_secs: u64,
}

impl Default for PerformanceSettings {
	fn default() -> Self {
		PerformanceSettings {
			max_workers: 8,
			batch_size: 10,
			rate: 0,
			burst: 0,
			task_timeout_secs: 30,
		}
	}
}

impl Project {
	/// Parse a project file
	pub fn load(path: impl AsRef<Path>) -> EnvyResult<Project> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|e| config_io_error(path, e))?;
		let mut project: Project = toml::from_str(&content).map_err(|e| {
			EnvyError::wrap(
				ErrorKind::ConfigParse,
				format!("Failed to parse '{}'", path.display()),
				e,
			)
			.with_detail("path", path.display().to_string())
		})?;
		project.apply_env_overrides(|name| env::var(name).ok());
		project.validate()?;
		Ok(project)
	}

	/// Find and load the nearest project file
	///
	/// Searches `start` and each ancestor up to the filesystem root;
	/// the first match wins.
	pub fn discover(start: impl AsRef<Path>) -> EnvyResult<(Project, PathBuf)> {
		let mut dir = Some(start.as_ref().to_path_buf());
		while let Some(current) = dir {
			let candidate = current.join(CONFIG_FILE_NAME);
			if candidate.is_file() {
				return Ok((Project::load(&candidate)?, candidate));
			}
			dir = current.parent().map(|p| p.to_path_buf());
		}
		Err(EnvyError::new(
			ErrorKind::ConfigNotFound,
			format!("No {} found in this directory or any parent", CONFIG_FILE_NAME),
		))
	}

	/// Resolve an environment by name, or the default one
	pub fn environment<'a>(&'a self, name: Option<&'a str>) -> EnvyResult<(&'a str, &'a Environment)> {
		let name = name.unwrap_or(&self.default_environment);
		match self.environments.get(name) {
			Some(env) => Ok((name, env)),
			None => Err(EnvyError::new(
				ErrorKind::InvalidEnvironment,
				format!("Environment '{}' is not configured", name),
			)
			.with_detail("environment", name.to_string())),
		}
	}

	/// Apply `ENVY_*` environment-variable overrides
	///
	/// Nested keys use `_` where the config path has `.`
	/// (cache.ttlSecs becomes ENVY_CACHE_TTL_SECS). The lookup is
	/// injected so tests run without touching the process environment.
	pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		let get = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

		if let Some(v) = get("DEFAULT_ENVIRONMENT") {
			self.default_environment = v;
		}
		if let Some(v) = get("BACKEND_SERVICE") {
			self.backend_service = v;
		}
		if let Some(v) = get("REGION") {
			self.region = v;
		}
		if let Some(v) = get("PROFILE") {
			self.profile = v;
		}
		if let Some(v) = get("ENDPOINT") {
			self.endpoint = Some(v);
		}
		if let Some(v) = get("CACHE_ENABLED") {
			if let Ok(flag) = v.parse() {
				self.cache.enabled = flag;
			}
		}
		if let Some(v) = get("CACHE_DIR") {
			self.cache.dir = Some(PathBuf::from(v));
		}
		if let Some(v) = get("CACHE_TTL_SECS") {
			if let Ok(secs) = v.parse() {
				self.cache.ttl_secs = secs;
			}
		}
		if let Some(v) = get("CACHE_ENCRYPTION_KEY") {
			self.cache.encryption_key = Some(v);
		}
		if let Some(v) = get("PERFORMANCE_MAX_WORKERS") {
			if let Ok(n) = v.parse() {
				self.performance.max_workers = n;
			}
		}
		if let Some(v) = get("PERFORMANCE_BATCH_SIZE") {
			if let Ok(n) = v.parse() {
				self.performance.batch_size = n;
			}
		}
		if let Some(v) = get("PERFORMANCE_RATE") {
			if let Ok(n) = v.parse() {
				self.performance.rate = n;
			}
		}
		if let Some(v) = get("PERFORMANCE_BURST") {
			if let Ok(n) = v.parse() {
				self.performance.burst = n;
			}
		}
	}

	fn validate(&self) -> EnvyResult<()> {
		if self.performance.max_workers == 0 {
			return Err(EnvyError::new(
				ErrorKind::ConfigInvalid,
				"performance.maxWorkers must be at least 1",
			));
		}
		if self.performance.batch_size == 0 {
			return Err(EnvyError::new(
				ErrorKind::ConfigInvalid,
				"performance.batchSize must be at least 1",
			));
		}
		for (name, env) in &self.environments {
			if env.path.is_empty() {
				return Err(EnvyError::new(
					ErrorKind::ConfigInvalid,
					format!("Environment '{}' has no remote path configured", name),
				)
				.with_detail("environment", name.clone()));
			}
		}
		Ok(())
	}

	/// Serialize back to TOML (used by `envy init` / `envy configure`)
	pub fn to_toml(&self) -> EnvyResult<String> {
		toml::to_string_pretty(self).map_err(|e| {
			EnvyError::wrap(ErrorKind::Internal, "Failed to serialize configuration", e)
		})
	}
}

fn config_io_error(path: &Path, err: io::Error) -> EnvyError {
	let kind = match err.kind() {
		io::ErrorKind::NotFound => ErrorKind::ConfigNotFound,
		io::ErrorKind::PermissionDenied => ErrorKind::ConfigPermission,
		_ => ErrorKind::ConfigInvalid,
	};
	EnvyError::wrap(kind, format!("Failed to read '{}'", path.display()), err)
		.with_detail("path", path.display().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"
name = "shop"
defaultEnvironment = "dev"
region = "eu-west-1"

[environments.dev]
files = [".env", ".env.dev"]
path = "/shop/dev/"

[environments.prod]
files = [".env.prod"]
path = "/shop/prod/"
useSecretStore = true

[cache]
ttlSecs = 300

[performance]
maxWorkers = 4
"#;

	#[test]
	fn test_parse_sample() {
		let project: Project = toml::from_str(SAMPLE).unwrap();
		assert_eq!(project.name, "shop");
		assert_eq!(project.default_environment, "dev");
		assert_eq!(project.region, "eu-west-1");
		assert_eq!(project.environments.len(), 2);
		assert!(project.environments["prod"].use_secret_store);
		assert!(!project.environments["dev"].use_secret_store);
		assert_eq!(project.cache.ttl_secs, 300);
		assert_eq!(project.performance.max_workers, 4);
		// Untouched fields keep defaults
		assert_eq!(project.performance.batch_size, 10);
	}

	#[test]
	fn test_environment_resolution() {
		let project: Project = toml::from_str(SAMPLE).unwrap();
		let (name, env) = project.environment(None).unwrap();
		assert_eq!(name, "dev");
		assert_eq!(env.path, "/shop/dev/");

		let (name, _) = project.environment(Some("prod")).unwrap();
		assert_eq!(name, "prod");

		let err = project.environment(Some("staging")).unwrap_err();
		assert_eq!(err.kind, ErrorKind::InvalidEnvironment);
	}

	#[test]
	fn test_env_overrides() {
		let mut project: Project = toml::from_str(SAMPLE).unwrap();
		project.apply_env_overrides(|name| match name {
			"ENVY_REGION" => Some("ap-south-1".to_string()),
			"ENVY_CACHE_ENABLED" => Some("false".to_string()),
			"ENVY_PERFORMANCE_MAX_WORKERS" => Some("2".to_string()),
			_ => None,
		});
		assert_eq!(project.region, "ap-south-1");
		assert!(!project.cache.enabled);
		assert_eq!(project.performance.max_workers, 2);
	}

	#[test]
	fn test_discovery_walks_upward() {
		let dir = tempfile::TempDir::new().unwrap();
		let nested = dir.path().join("a/b/c");
		fs::create_dir_all(&nested).unwrap();
		fs::write(dir.path().join(CONFIG_FILE_NAME), SAMPLE).unwrap();

		let (project, path) = Project::discover(&nested).unwrap();
		assert_eq!(project.name, "shop");
		assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
	}

	#[test]
	fn test_discovery_not_found() {
		let dir = tempfile::TempDir::new().unwrap();
		// No config anywhere under a temp root; stop early by starting at
		// the temp dir and asserting the error kind when the walk misses.
		let result = Project::discover(dir.path());
		if let Err(err) = result {
			assert_eq!(err.kind, ErrorKind::ConfigNotFound);
		}
	}

	#[test]
	fn test_invalid_config_rejected() {
		let broken = r#"
name = "x"
[environments.dev]
files = [".env"]
path = ""
"#;
		let project: Project = toml::from_str(broken).unwrap();
		assert!(project.validate().is_err());
	}
}

// vim: ts=4
