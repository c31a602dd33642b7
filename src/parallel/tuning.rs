//! Backend-tuned rate profiles
//!
//! Each backend throttles differently; these profiles keep bulk
//! operations just under the service limits. Writes are the scarce
//! resource; reads run at double the write budget.

use super::rate_limit::RateLimiter;
use crate::remote::BackendKind;

/// A `{rate, burst}` pair for the token bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateProfile {
	pub rate: u32,
	pub burst: u32,
}

impl RateProfile {
	/// Conservative fallback when the backend is unknown
	pub const DEFAULT: RateProfile = RateProfile { rate: 50, burst: 100 };

	/// Build the limiter for this profile
	pub fn limiter(&self) -> RateLimiter {
		RateLimiter::new(self.rate, self.burst)
	}
}

/// Profile for bulk writes against a backend
pub fn write_profile(backend: BackendKind) -> RateProfile {
	match backend {
		BackendKind::ParameterStore => RateProfile { rate: 100, burst: 200 },
		BackendKind::SecretStore => RateProfile { rate: 50, burst: 100 },
		BackendKind::Memory => RateProfile { rate: 10_000, burst: 10_000 },
	}
}

/// Profile for bulk reads against a backend
pub fn read_profile(backend: BackendKind) -> RateProfile {
	match backend {
		BackendKind::ParameterStore => RateProfile { rate: 200, burst: 400 },
		BackendKind::SecretStore => RateProfile { rate: 100, burst: 200 },
		BackendKind::Memory => RateProfile { rate: 10_000, burst: 10_000 },
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_profiles() {
		assert_eq!(
			write_profile(BackendKind::ParameterStore),
			RateProfile { rate: 100, burst: 200 }
		);
		assert_eq!(
			write_profile(BackendKind::SecretStore),
			RateProfile { rate: 50, burst: 100 }
		);
	}

	#[test]
	fn test_reads_exceed_writes() {
		for backend in [BackendKind::ParameterStore, BackendKind::SecretStore] {
			assert!(read_profile(backend).rate > write_profile(backend).rate);
		}
	}
}

// vim: ts=4
