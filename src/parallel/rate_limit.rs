//! Token-bucket rate limiter
//!
//! The bucket starts full at `burst` tokens and is refilled one token
//! every `1s / rate` by a background ticker; refills past the burst
//! capacity are discarded. Waiters block until a token is available or
//! their cancellation token fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// Token bucket with background refill
#[derive(Debug)]
pub struct RateLimiter {
	tokens: Arc<Semaphore>,
	stop: CancellationToken,
	rate: u32,
	burst: u32,
}

impl RateLimiter {
	/// Create a limiter delivering `rate` tokens/second with `burst` capacity
	pub fn new(rate: u32, burst: u32) -> Self {
		let rate = rate.max(1);
		let burst = burst.max(1) as usize;
		let tokens = Arc::new(Semaphore::new(burst));
		let stop = CancellationToken::new();

		let refill_tokens = Arc::clone(&tokens);
		let refill_stop = stop.clone();
		let period = Duration::from_secs_f64(1.0 / rate as f64);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			// The first tick fires immediately; skip it so a full bucket
			// is not over-filled at startup
			ticker.tick().await;
			loop {
				tokio::select! {
					_ = refill_stop.cancelled() => break,
					_ = ticker.tick() => {
						if refill_tokens.available_permits() < burst {
							refill_tokens.add_permits(1);
						}
					}
				}
			}
		});

		RateLimiter { tokens, stop, rate, burst: burst as u32 }
	}

	/// Take one token, waiting for refill if the bucket is empty
	pub async fn wait(&self, cancel: &CancellationToken) -> EnvyResult<()> {
		tokio::select! {
			_ = cancel.cancelled() => Err(
				EnvyError::new(ErrorKind::Timeout, "Rate-limit wait cancelled").retriable(true)
			),
			permit = self.tokens.acquire() => {
				// The semaphore is never closed while the limiter lives
				if let Ok(permit) = permit {
					permit.forget();
				}
				Ok(())
			}
		}
	}

	/// Halt the refill ticker; pending waiters end with their own tokens
	pub fn stop(&self) {
		self.stop.cancel();
	}

	pub fn rate(&self) -> u32 {
		self.rate
	}

	pub fn burst(&self) -> u32 {
		self.burst
	}
}

impl Drop for RateLimiter {
	fn drop(&mut self) {
		self.stop.cancel();
	}
}


// vim: ts=4
