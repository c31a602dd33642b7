//! Shared progress counters for bulk operations
//!
//! Counters are atomic and only ever move forward, so concurrent
//! workers can report without coordination and display code can poll a
//! consistent snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic total/completed/failed counters
#[derive(Debug, Default)]
pub struct ProgressTracker {
	total: AtomicU64,
	completed: AtomicU64,
	failed: AtomicU64,
}

/// Point-in-time view of progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
	pub total: u64,
	pub completed: u64,
	pub failed: u64,
}

impl ProgressTracker {
	pub fn new(total: u64) -> Self {
		ProgressTracker {
			total: AtomicU64::new(total),
			completed: AtomicU64::new(0),
			failed: AtomicU64::new(0),
		}
	}

	/// Grow the expected total (more work discovered)
	pub fn add_total(&self, n: u64) {
		self.total.fetch_add(n, Ordering::Relaxed);
	}

	pub fn add_completed(&self, n: u64) {
		self.completed.fetch_add(n, Ordering::Relaxed);
	}

	pub fn add_failed(&self, n: u64) {
		self.failed.fetch_add(n, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> ProgressSnapshot {
		ProgressSnapshot {
			total: self.total.load(Ordering::Relaxed),
			completed: self.completed.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
		}
	}
}

impl ProgressSnapshot {
	/// Completed plus failed
	pub fn finished(&self) -> u64 {
		self.completed + self.failed
	}

	pub fn is_done(&self) -> bool {
		self.finished() >= self.total
	}

	/// One-line rendering for the CLI progress display
	pub fn render(&self) -> String {
		if self.failed > 0 {
			format!("{}/{} ({} failed)", self.finished(), self.total, self.failed)
		} else {
			format!("{}/{}", self.finished(), self.total)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[test]
	fn test_counts() {
		let tracker = ProgressTracker::new(10);
		tracker.add_completed(3);
		tracker.add_failed(1);

		let snap = tracker.snapshot();
		assert_eq!(snap.total, 10);
		assert_eq!(snap.completed, 3);
		assert_eq!(snap.failed, 1);
		assert_eq!(snap.finished(), 4);
		assert!(!snap.is_done());
		assert_eq!(snap.render(), "4/10 (1 failed)");
	}

	#[tokio::test]
	async fn test_concurrent_increments() {
		let tracker = Arc::new(ProgressTracker::new(100));
		let mut handles = Vec::new();
		for _ in 0..10 {
			let tracker = Arc::clone(&tracker);
			handles.push(tokio::spawn(async move {
				for _ in 0..10 {
					tracker.add_completed(1);
				}
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let snap = tracker.snapshot();
		assert_eq!(snap.completed, 100);
		assert!(snap.is_done());
	}
}

// vim: ts=4
