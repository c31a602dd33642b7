//! Batch processor over the worker pool
//!
//! Splits a slice of items into fixed-size batches. Each batch becomes
//! one pool task that fans out over its items concurrently, retries
//! each item under the configured policy, and reports progress only
//! once the whole batch has finished.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::pool::{PoolOptions, Task, TaskOutcome, WorkerPool};
use super::progress::ProgressTracker;
use crate::error::{EnvyError, EnvyResult, ErrorKind};
use crate::retry::{retry, RetryPolicy};

/// Fans batched items out over the pool with per-item retry
#[derive(Debug, Clone)]
pub struct BatchProcessor {
	pub batch_size: usize,
	pub policy: RetryPolicy,
	pub options: PoolOptions,
}

impl BatchProcessor {
	pub fn new(batch_size: usize) -> Self {
		BatchProcessor {
			batch_size: batch_size.max(1),
			policy: RetryPolicy::default(),
			options: PoolOptions::default(),
		}
	}

	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_options(mut self, options: PoolOptions) -> Self {
		self.options = options;
		self
	}

	/// Process every item, returning one outcome per batch
	///
	/// `process` runs once per item (plus retries); items within a batch
	/// run concurrently, and batches run concurrently across workers.
	/// A batch outcome is an error when any of its items exhausted
	/// retries.
	pub async fn run<T, F, Fut>(
		&self,
		items: Vec<T>,
		cancel: &CancellationToken,
		progress: Option<Arc<ProgressTracker>>,
		process: F,
	) -> EnvyResult<Vec<TaskOutcome>>
	where
		T: Clone + Send + Sync + 'static,
		F: Fn(CancellationToken, T) -> Fut + Send + Sync + Clone + 'static,
		Fut: std::future::Future<Output = EnvyResult<()>> + Send + 'static,
	{
		if let Some(progress) = &progress {
			progress.add_total(items.len() as u64);
		}

		let mut options = self.options.clone();
		// A batch runs for as long as its slowest item and its retries;
		// size the task timeout accordingly rather than per item
		if let Some(timeout) = options.task_timeout {
			options.task_timeout =
				Some(timeout.max(Duration::from_secs(1)) * self.batch_size as u32);
		}
		let pool = WorkerPool::with_cancellation(options, cancel.child_token(), None);

		let batches: Vec<Vec<T>> =
			items.chunks(self.batch_size).map(|chunk| chunk.to_vec()).collect();
		for (index, batch) in batches.into_iter().enumerate() {
			let process = process.clone();
			let policy = self.policy.clone();
			let progress = progress.clone();
			let size = batch.len();

			let task = Task::new(format!("batch-{}", index), move |token| async move {
				let attempts = batch.into_iter().map(|item| {
					let process = process.clone();
					let policy = policy.clone();
					let token = token.clone();
					async move {
						let item_token = token.clone();
						retry(&policy, &token, move |_| {
							process(item_token.clone(), item.clone())
						})
						.await
					}
				});
				let results = futures::future::join_all(attempts).await;

				let failed = results.iter().filter(|r| r.is_err()).count();
				if let Some(progress) = &progress {
					progress.add_completed((size - failed) as u64);
					progress.add_failed(failed as u64);
				}

				if failed > 0 {
					Err(EnvyError::new(
						ErrorKind::Internal,
						format!("{} of {} items in batch failed", failed, size),
					))
				} else {
					Ok(())
				}
			})
			.retriable(false);

			pool.submit(task).await?;
		}

		Ok(pool.wait().await)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[tokio::test]
	async fn test_every_item_processed_once() {
		let processor = BatchProcessor::new(3);
		let cancel = CancellationToken::new();
		let count = Arc::new(AtomicU32::new(0));

		let count_clone = Arc::clone(&count);
		let outcomes = processor
			.run((0..10).collect(), &cancel, None, move |_, _item: i32| {
				let count = Arc::clone(&count_clone);
				async move {
					count.fetch_add(1, Ordering::SeqCst);
					Ok(())
				}
			})
			.await
			.unwrap();

		// 10 items in batches of 3 -> 4 batches
		assert_eq!(outcomes.len(), 4);
		assert!(outcomes.iter().all(|o| o.is_ok()));
		assert_eq!(count.load(Ordering::SeqCst), 10);
	}

	#[tokio::test]
	async fn test_per_item_retry_inside_batch() {
		let processor = BatchProcessor::new(5)
			.with_policy(RetryPolicy::fixed(3, Duration::from_millis(1)));
		let cancel = CancellationToken::new();
		let attempts = Arc::new(AtomicU32::new(0));

		let attempts_clone = Arc::clone(&attempts);
		let outcomes = processor
			.run(vec![1], &cancel, None, move |_, _item: i32| {
				let attempts = Arc::clone(&attempts_clone);
				async move {
					if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
						Err(EnvyError::new(ErrorKind::NetworkTimeout, "flaky"))
					} else {
						Ok(())
					}
				}
			})
			.await
			.unwrap();

		assert!(outcomes.iter().all(|o| o.is_ok()));
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_progress_counts_batch_results() {
		let processor = BatchProcessor::new(2)
			.with_policy(RetryPolicy::none());
		let cancel = CancellationToken::new();
		let progress = Arc::new(ProgressTracker::new(0));

		let outcomes = processor
			.run(
				(0..5).collect(),
				&cancel,
				Some(Arc::clone(&progress)),
				move |_, item: i32| async move {
					if item == 3 {
						Err(EnvyError::new(ErrorKind::AccessDenied, "denied"))
					} else {
						Ok(())
					}
				},
			)
			.await
			.unwrap();

		let snap = progress.snapshot();
		assert_eq!(snap.total, 5);
		assert_eq!(snap.completed, 4);
		assert_eq!(snap.failed, 1);
		assert_eq!(outcomes.iter().filter(|o| !o.is_ok()).count(), 1);
	}
}

// vim: ts=4
