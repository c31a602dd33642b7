//! Backoff and retry for remote operations
//!
//! An attempt is retried only while attempts remain and the error is
//! retriable per the taxonomy (rate limiting, remote/network timeouts,
//! or an explicit producer flag). Sleeps race against the cancellation
//! token so a stopped engine never waits out a backoff.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// Delay progression between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
	/// Same delay every time
	Fixed,
	/// `initial * multiplier^(n-1)`, capped at `max_delay`
	Exponential,
	/// Exponential plus uniform jitter in `[0, delay)`
	ExponentialWithJitter,
}

/// Retry policy parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	pub kind: BackoffKind,
	/// Total attempts, including the first
	pub max_attempts: u32,
	pub initial_delay: Duration,
	pub max_delay: Duration,
	pub multiplier: f64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		RetryPolicy {
			kind: BackoffKind::ExponentialWithJitter,
			max_attempts: 3,
			initial_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(10),
			multiplier: 2.0,
		}
	}
}

impl RetryPolicy {
	/// Fixed delay between attempts
	pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
		RetryPolicy {
			kind: BackoffKind::Fixed,
			max_attempts,
			initial_delay: delay,
			max_delay: delay,
			multiplier: 1.0,
		}
	}

	/// Exponential backoff without jitter
	pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
		RetryPolicy {
			kind: BackoffKind::Exponential,
			max_attempts,
			initial_delay: initial,
			max_delay: max,
			multiplier: 2.0,
		}
	}

	/// Exponential backoff with uniform jitter
	pub fn exponential_with_jitter(max_attempts: u32, initial: Duration, max: Duration) -> Self {
		RetryPolicy { kind: BackoffKind::ExponentialWithJitter, ..Self::exponential(max_attempts, initial, max) }
	}

	/// A single retry: callers that must not repeat side effects
	pub fn none() -> Self {
		RetryPolicy { max_attempts: 1, ..RetryPolicy::default() }
	}

	/// Base delay before the attempt following attempt `n` (1-based)
	pub fn base_delay(&self, attempt: u32) -> Duration {
		match self.kind {
			BackoffKind::Fixed => self.initial_delay,
			BackoffKind::Exponential | BackoffKind::ExponentialWithJitter => {
				let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
				let raw = self.initial_delay.as_secs_f64() * factor;
				Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
			}
		}
	}

	/// Base delay plus jitter when the policy uses it
	fn next_delay(&self, attempt: u32) -> Duration {
		let base = self.base_delay(attempt);
		if self.kind == BackoffKind::ExponentialWithJitter && !base.is_zero() {
			let jitter = rand::thread_rng().gen_range(0.0..base.as_secs_f64());
			base + Duration::from_secs_f64(jitter)
		} else {
			base
		}
	}
}

/// Hook invoked as `(error, attempt, next_delay)` before each backoff sleep
pub type NotifyFn<'a> = dyn Fn(&EnvyError, u32, Duration) + Send + Sync + 'a;

/// Run an operation under a retry policy
pub async fn retry<T, F, Fut>(
	policy: &RetryPolicy,
	cancel: &CancellationToken,
	op: F,
) -> EnvyResult<T>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = EnvyResult<T>>,
{
	retry_notify(policy, cancel, op, None).await
}

/// Run an operation under a retry policy with a notify hook
pub async fn retry_notify<T, F, Fut>(
	policy: &RetryPolicy,
	cancel: &CancellationToken,
	mut op: F,
	notify: Option<&NotifyFn<'_>>,
) -> EnvyResult<T>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = EnvyResult<T>>,
{
	let attempts = policy.max_attempts.max(1);
	for attempt in 1..=attempts {
		if cancel.is_cancelled() {
			return Err(cancelled());
		}

		match op(attempt).await {
			Ok(value) => return Ok(value),
			Err(err) => {
				if attempt == attempts || !err.is_retriable() {
					return Err(err);
				}
				let delay = policy.next_delay(attempt);
				if let Some(hook) = notify {
					hook(&err, attempt, delay);
				}
				tracing::debug!(
					attempt,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"retrying after backoff"
				);
				tokio::select! {
					_ = cancel.cancelled() => return Err(cancelled()),
					_ = tokio::time::sleep(delay) => {}
				}
			}
		}
	}
	unreachable!("retry loop returns from its last attempt")
}

fn cancelled() -> EnvyError {
	EnvyError::new(ErrorKind::Timeout, "Operation cancelled").retriable(true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Mutex;

	fn transient() -> EnvyError {
		EnvyError::new(ErrorKind::NetworkTimeout, "slow network")
	}

	#[test]
	fn test_exponential_delay_sequence() {
		let policy = RetryPolicy::exponential(
			5,
			Duration::from_millis(100),
			Duration::from_millis(350),
		);
		assert_eq!(policy.base_delay(1), Duration::from_millis(100));
		assert_eq!(policy.base_delay(2), Duration::from_millis(200));
		// Capped at max_delay
		assert_eq!(policy.base_delay(3), Duration::from_millis(350));
		assert_eq!(policy.base_delay(4), Duration::from_millis(350));
	}

	#[test]
	fn test_fixed_delay_sequence() {
		let policy = RetryPolicy::fixed(3, Duration::from_millis(50));
		assert_eq!(policy.base_delay(1), Duration::from_millis(50));
		assert_eq!(policy.base_delay(3), Duration::from_millis(50));
	}

	#[tokio::test]
	async fn test_attempt_count_bounded() {
		let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);

		let result: EnvyResult<()> = retry(&policy, &cancel, |_| {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(transient()) }
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_success_stops_retrying() {
		let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);

		let result = retry(&policy, &cancel, |attempt| {
			calls.fetch_add(1, Ordering::SeqCst);
			async move {
				if attempt < 3 {
					Err(transient())
				} else {
					Ok(attempt)
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), 3);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_non_retriable_fails_fast() {
		let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);

		let result: EnvyResult<()> = retry(&policy, &cancel, |_| {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(EnvyError::new(ErrorKind::AccessDenied, "no")) }
		})
		.await;

		assert_eq!(result.unwrap_err().kind, ErrorKind::AccessDenied);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_cancellation_short_circuits_backoff() {
		let policy = RetryPolicy::fixed(3, Duration::from_secs(60));
		let cancel = CancellationToken::new();
		let child = cancel.clone();

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			child.cancel();
		});

		let start = std::time::Instant::now();
		let result: EnvyResult<()> =
			retry(&policy, &cancel, |_| async { Err(transient()) }).await;

		assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
		assert!(start.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn test_notify_hook_sees_each_backoff() {
		let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
		let cancel = CancellationToken::new();
		let seen: Mutex<Vec<u32>> = Mutex::new(Vec::new());

		let _: EnvyResult<()> = retry_notify(
			&policy,
			&cancel,
			|_| async { Err(transient()) },
			Some(&|_err, attempt, _delay| {
				seen.lock().unwrap().push(attempt);
			}),
		)
		.await;

		// Notified before each sleep: after attempts 1 and 2, not after the last
		assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
	}
}

// vim: ts=4
