//! Error types for envy operations
//!
//! All failures funnel into a single [`EnvyError`] carrying a tagged
//! [`ErrorKind`], a human-readable message, optional structured details,
//! and the wrapped cause. The kind decides retry eligibility and the
//! process exit code.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::time::SystemTime;

/// Result type for envy operations
pub type EnvyResult<T> = Result<T, EnvyError>;

/// Tagged error categories
///
/// Grouped by subsystem: configuration, validation, remote service,
/// local files, network, system. The tag string (`as_str`) is stable
/// and used in machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	// === Configuration ===
	ConfigNotFound,
	ConfigInvalid,
	ConfigParse,
	ConfigPermission,

	// === Validation ===
	ValidationFailed,
	InvalidArgument,
	InvalidEnvironment,
	InvalidKeyFormat,
	RequiredField,

	// === Remote service ===
	RemoteAuth,
	RemoteConnection,
	RateLimited,
	AccessDenied,
	ParamNotFound,
	SecretNotFound,
	ParamExists,
	SecretExists,
	RemoteTimeout,

	// === Local files ===
	FileNotFound,
	FilePermission,
	FileRead,
	FileWrite,
	FileInvalid,

	// === Network ===
	NetworkTimeout,
	NetworkUnavailable,
	DnsFailure,

	// === System ===
	Internal,
	Unknown,
	NotSupported,
	Timeout,
	InvalidInput,
}

impl ErrorKind {
	/// Stable tag used in logs and machine-readable output
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::ConfigNotFound => "config-notfound",
			ErrorKind::ConfigInvalid => "config-invalid",
			ErrorKind::ConfigParse => "config-parse",
			ErrorKind::ConfigPermission => "config-permission",
			ErrorKind::ValidationFailed => "validation-failed",
			ErrorKind::InvalidArgument => "validation-invalid-arg",
			ErrorKind::InvalidEnvironment => "validation-invalid-environment",
			ErrorKind::InvalidKeyFormat => "validation-invalid-key-format",
			ErrorKind::RequiredField => "validation-required-field",
			ErrorKind::RemoteAuth => "remote-auth",
			ErrorKind::RemoteConnection => "remote-connection",
			ErrorKind::RateLimited => "remote-ratelimit",
			ErrorKind::AccessDenied => "remote-access-denied",
			ErrorKind::ParamNotFound => "remote-param-not-found",
			ErrorKind::SecretNotFound => "remote-secret-not-found",
			ErrorKind::ParamExists => "remote-param-exists",
			ErrorKind::SecretExists => "remote-secret-exists",
			ErrorKind::RemoteTimeout => "remote-timeout",
			ErrorKind::FileNotFound => "file-notfound",
			ErrorKind::FilePermission => "file-permission",
			ErrorKind::FileRead => "file-read",
			ErrorKind::FileWrite => "file-write",
			ErrorKind::FileInvalid => "file-invalid",
			ErrorKind::NetworkTimeout => "network-timeout",
			ErrorKind::NetworkUnavailable => "network-unavailable",
			ErrorKind::DnsFailure => "network-dns",
			ErrorKind::Internal => "system-internal",
			ErrorKind::Unknown => "system-unknown",
			ErrorKind::NotSupported => "system-not-supported",
			ErrorKind::Timeout => "system-timeout",
			ErrorKind::InvalidInput => "system-invalid-input",
		}
	}

	/// Whether errors of this kind are retried by default
	pub fn default_retriable(&self) -> bool {
		matches!(
			self,
			ErrorKind::RateLimited
				| ErrorKind::RemoteTimeout
				| ErrorKind::NetworkTimeout
				| ErrorKind::Timeout
		)
	}

	/// Process exit code for a terminal error of this kind
	///
	/// 1 = generic failure, 2 = validation failure, 3 = remote auth failure.
	pub fn exit_code(&self) -> i32 {
		match self {
			ErrorKind::ValidationFailed
			| ErrorKind::InvalidArgument
			| ErrorKind::InvalidEnvironment
			| ErrorKind::InvalidKeyFormat
			| ErrorKind::RequiredField => 2,
			ErrorKind::RemoteAuth => 3,
			_ => 1,
		}
	}

	/// Actionable remediation hint shown to users, if one exists
	pub fn suggestion(&self) -> Option<&'static str> {
		match self {
			ErrorKind::ConfigNotFound => {
				Some("Run 'envy init' to initialize a project configuration")
			}
			ErrorKind::ConfigParse | ErrorKind::ConfigInvalid => {
				Some("Check envy.toml for syntax errors or run 'envy configure'")
			}
			ErrorKind::RemoteAuth => {
				Some("Check your service credentials (ENVY_TOKEN or the configured profile)")
			}
			ErrorKind::AccessDenied => {
				Some("Verify that your credentials grant access to the configured path prefix")
			}
			ErrorKind::RateLimited => {
				Some("Reduce --max-workers or lower the configured rate limit")
			}
			ErrorKind::ParamExists | ErrorKind::SecretExists => {
				Some("Use --force to overwrite existing remote values")
			}
			ErrorKind::InvalidEnvironment => {
				Some("List configured environments with 'envy list' or add one with 'envy configure'")
			}
			_ => None,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Structured error carrying kind, message, details and cause
pub struct EnvyError {
	/// Error category
	pub kind: ErrorKind,
	/// Human-readable message
	pub message: String,
	/// Structured key/value context (path, environment, key name, ...)
	pub details: BTreeMap<String, String>,
	/// Wrapped source error
	pub cause: Option<Box<dyn Error + Send + Sync>>,
	/// When the error was produced
	pub timestamp: SystemTime,
	retriable: bool,
}

impl EnvyError {
	/// Create an error of the given kind
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		EnvyError {
			kind,
			message: message.into(),
			details: BTreeMap::new(),
			cause: None,
			timestamp: SystemTime::now(),
			retriable: kind.default_retriable(),
		}
	}

	/// Wrap a source error
	pub fn wrap(
		kind: ErrorKind,
		message: impl Into<String>,
		cause: impl Error + Send + Sync + 'static,
	) -> Self {
		EnvyError::new(kind, message).with_cause(cause)
	}

	/// Attach a structured detail
	pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.details.insert(key.into(), value.into());
		self
	}

	/// Attach a source error
	pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}

	/// Override retry eligibility
	///
	/// Producers flag errors retriable when the failure is transient even
	/// though its kind is not retried by default.
	pub fn retriable(mut self, retriable: bool) -> Self {
		self.retriable = retriable;
		self
	}

	/// Whether the retry layer may re-attempt the failed operation
	pub fn is_retriable(&self) -> bool {
		self.retriable
	}

	/// Render for terminal output
	///
	/// Verbose mode appends the wrapped cause chain; a remediation
	/// suggestion is appended when one exists for the kind.
	pub fn render(&self, verbose: bool) -> String {
		let mut out = format!("[{}] {}", self.kind, self.message);
		if verbose {
			let mut source = self.cause.as_deref().map(|c| c as &dyn Error);
			while let Some(cause) = source {
				out.push_str(&format!("\n  caused by: {}", cause));
				source = cause.source();
			}
		}
		if let Some(hint) = self.kind.suggestion() {
			out.push_str(&format!("\n  hint: {}", hint));
		}
		out
	}
}

impl fmt::Display for EnvyError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.message)?;
		if let Some(cause) = &self.cause {
			write!(f, ": {}", cause)?;
		}
		Ok(())
	}
}

impl fmt::Debug for EnvyError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnvyError")
			.field("kind", &self.kind)
			.field("message", &self.message)
			.field("details", &self.details)
			.field("cause", &self.cause)
			.field("retriable", &self.retriable)
			.finish()
	}
}

impl Error for EnvyError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.cause.as_ref().map(|c| c.as_ref() as &(dyn Error + 'static))
	}
}

impl From<io::Error> for EnvyError {
	fn from(e: io::Error) -> Self {
		let kind = classify_io(&e);
		EnvyError::wrap(kind, "I/O error", e)
	}
}

/// Map an I/O error to the file taxonomy
pub fn classify_io(err: &io::Error) -> ErrorKind {
	match err.kind() {
		io::ErrorKind::NotFound => ErrorKind::FileNotFound,
		io::ErrorKind::PermissionDenied => ErrorKind::FilePermission,
		io::ErrorKind::TimedOut => ErrorKind::Timeout,
		_ => ErrorKind::FileRead,
	}
}

/// Wrap an I/O error from reading a local file
pub fn file_read_error(path: impl fmt::Display, err: io::Error) -> EnvyError {
	let kind = classify_io(&err);
	EnvyError::wrap(kind, format!("Failed to read '{}'", path), err)
		.with_detail("path", path.to_string())
}

/// Wrap an I/O error from writing a local file
pub fn file_write_error(path: impl fmt::Display, err: io::Error) -> EnvyError {
	let kind = match err.kind() {
		io::ErrorKind::PermissionDenied => ErrorKind::FilePermission,
		_ => ErrorKind::FileWrite,
	};
	EnvyError::wrap(kind, format!("Failed to write '{}'", path), err)
		.with_detail("path", path.to_string())
}

/// Classify a transport error by its canonical message
///
/// The HTTP client surfaces DNS and connect failures only through the
/// error chain text, so classification inspects the rendered message.
pub fn classify_network(err: &(dyn Error + 'static)) -> ErrorKind {
	let text = {
		let mut parts = vec![err.to_string()];
		let mut source = err.source();
		while let Some(cause) = source {
			parts.push(cause.to_string());
			source = cause.source();
		}
		parts.join(": ").to_lowercase()
	};
	if text.contains("timed out") || text.contains("timeout") {
		ErrorKind::NetworkTimeout
	} else if text.contains("dns")
		|| text.contains("name or service not known")
		|| text.contains("failed to lookup")
	{
		ErrorKind::DnsFailure
	} else if text.contains("connection refused")
		|| text.contains("unreachable")
		|| text.contains("connection reset")
	{
		ErrorKind::NetworkUnavailable
	} else {
		ErrorKind::RemoteConnection
	}
}

/// Map a remote HTTP status to the taxonomy
pub fn classify_status(status: u16) -> ErrorKind {
	match status {
		401 => ErrorKind::RemoteAuth,
		403 => ErrorKind::AccessDenied,
		404 => ErrorKind::ParamNotFound,
		408 | 504 => ErrorKind::RemoteTimeout,
		409 => ErrorKind::ParamExists,
		429 => ErrorKind::RateLimited,
		_ => ErrorKind::RemoteConnection,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_retriable_kinds() {
		assert!(ErrorKind::RateLimited.default_retriable());
		assert!(ErrorKind::RemoteTimeout.default_retriable());
		assert!(ErrorKind::NetworkTimeout.default_retriable());
		assert!(!ErrorKind::ParamNotFound.default_retriable());
		assert!(!ErrorKind::ConfigInvalid.default_retriable());
	}

	#[test]
	fn test_explicit_retriable_flag_overrides_kind() {
		let err = EnvyError::new(ErrorKind::RemoteConnection, "transient blip").retriable(true);
		assert!(err.is_retriable());

		let err = EnvyError::new(ErrorKind::RateLimited, "slow down").retriable(false);
		assert!(!err.is_retriable());
	}

	#[test]
	fn test_exit_codes() {
		assert_eq!(ErrorKind::Unknown.exit_code(), 1);
		assert_eq!(ErrorKind::ValidationFailed.exit_code(), 2);
		assert_eq!(ErrorKind::RemoteAuth.exit_code(), 3);
	}

	#[test]
	fn test_classify_io() {
		let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
		assert_eq!(classify_io(&not_found), ErrorKind::FileNotFound);

		let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
		assert_eq!(classify_io(&denied), ErrorKind::FilePermission);
	}

	#[test]
	fn test_classify_network_strings() {
		let timeout = io::Error::new(io::ErrorKind::TimedOut, "operation timed out");
		assert_eq!(classify_network(&timeout), ErrorKind::NetworkTimeout);

		let dns = io::Error::new(io::ErrorKind::Other, "failed to lookup address");
		assert_eq!(classify_network(&dns), ErrorKind::DnsFailure);

		let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
		assert_eq!(classify_network(&refused), ErrorKind::NetworkUnavailable);
	}

	#[test]
	fn test_render_includes_suggestion() {
		let err = EnvyError::new(ErrorKind::ConfigNotFound, "No envy.toml found");
		let rendered = err.render(false);
		assert!(rendered.contains("config-notfound"));
		assert!(rendered.contains("envy init"));
	}

	#[test]
	fn test_display_includes_cause() {
		let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
		let err = EnvyError::wrap(ErrorKind::FileNotFound, "Failed to read '.env'", io_err);
		assert_eq!(format!("{}", err), "Failed to read '.env': missing");
	}
}

// vim: ts=4
