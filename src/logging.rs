//! Diagnostic output setup
//!
//! Envy writes its diagnostics to stderr through `tracing` so that
//! pulled env-file content on stdout stays machine-consumable. The
//! level macros are re-exported here, and [`init_tracing`] wires the
//! subscriber to the CLI's `--debug`/`--verbose`/`--quiet` flags.

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at WARN level and above are displayed; `--verbose`
/// raises that to INFO and `--debug` to DEBUG. The `RUST_LOG`
/// environment variable overrides both:
///
/// ```bash
/// RUST_LOG=debug envy push
/// RUST_LOG=envy::sync=trace envy pull
/// ```
pub fn init_tracing(debug: bool, verbose: bool, quiet: bool) {
	let default_level = if quiet {
		"error"
	} else if debug {
		"debug"
	} else if verbose {
		"info"
	} else {
		"warn"
	};

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.init();
}
