//! Parallel execution substrate
//!
//! The bounded worker pool and its companions: batch fan-out with
//! per-item retry, token-bucket rate limiting, and shared progress
//! counters for bulk push/pull.

pub mod batch;
pub mod pool;
pub mod progress;
pub mod rate_limit;
pub mod tuning;

pub use self::batch::BatchProcessor;
pub use self::pool::{ErrorHandler, PoolMetrics, PoolOptions, Task, TaskOutcome, WorkerPool};
pub use self::progress::{ProgressSnapshot, ProgressTracker};
pub use self::rate_limit::RateLimiter;
pub use self::tuning::{read_profile, write_profile, RateProfile};

// vim: ts=4
