//! Bounded worker pool
//!
//! A fixed set of workers drains a bounded task queue. `submit` applies
//! backpressure when the queue is full and fails once the pool is
//! stopped. Stopping cancels the pool token: queued tasks are
//! discarded and in-flight tasks observe cancellation through their
//! child token at the next suspension point.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EnvyError, EnvyResult, ErrorKind};

/// A unit of work submitted to the pool
pub struct Task {
	pub name: String,
	/// Whether callers may re-submit this task after a failure
	pub retriable: bool,
	execute: Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, EnvyResult<()>> + Send>,
}

impl Task {
	/// Create a task from an async closure
	///
	/// The closure receives a cancellation token derived from the
	/// pool's; long tasks should check it at their own suspension
	/// points.
	pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
	where
		F: FnOnce(CancellationToken) -> Fut + Send + 'static,
		Fut: std::future::Future<Output = EnvyResult<()>> + Send + 'static,
	{
		Task {
			name: name.into(),
			retriable: false,
			execute: Box::new(move |token| Box::pin(f(token))),
		}
	}

	pub fn retriable(mut self, retriable: bool) -> Self {
		self.retriable = retriable;
		self
	}

	fn run(self, token: CancellationToken) -> BoxFuture<'static, EnvyResult<()>> {
		(self.execute)(token)
	}
}

impl std::fmt::Debug for Task {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Task")
			.field("name", &self.name)
			.field("retriable", &self.retriable)
			.finish_non_exhaustive()
	}
}

/// Result of one executed task
#[derive(Debug)]
pub struct TaskOutcome {
	pub name: String,
	pub error: Option<EnvyError>,
	pub duration: Duration,
}

impl TaskOutcome {
	pub fn is_ok(&self) -> bool {
		self.error.is_none()
	}
}

/// Pool construction knobs
#[derive(Debug, Clone)]
pub struct PoolOptions {
	/// Worker count
	pub workers: usize,
	/// Task queue capacity; `submit` blocks when full
	pub queue_capacity: usize,
	/// Per-task execution timeout
	pub task_timeout: Option<Duration>,
	/// Minimum interval between task starts across the pool
	pub rate_interval: Option<Duration>,
}

impl Default for PoolOptions {
	fn default() -> Self {
		PoolOptions {
			workers: 8,
			queue_capacity: 64,
			task_timeout: Some(Duration::from_secs(30)),
			rate_interval: None,
		}
	}
}

/// Live pool counters
#[derive(Debug, Default)]
pub struct PoolMetrics {
	processed: AtomicU64,
	failed: AtomicU64,
	active: AtomicU64,
}

impl PoolMetrics {
	pub fn processed(&self) -> u64 {
		self.processed.load(Ordering::Relaxed)
	}

	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	pub fn active(&self) -> u64 {
		self.active.load(Ordering::Relaxed)
	}
}

/// Callback invoked for every failed task
pub type ErrorHandler = Arc<dyn Fn(&TaskOutcome) + Send + Sync>;

/// Fixed-size worker pool over a bounded queue
pub struct WorkerPool {
	tx: mpsc::Sender<Task>,
	results: mpsc::UnboundedReceiver<TaskOutcome>,
	workers: Vec<tokio::task::JoinHandle<()>>,
	cancel: CancellationToken,
	metrics: Arc<PoolMetrics>,
}

impl WorkerPool {
	pub fn new(options: PoolOptions) -> Self {
		Self::with_cancellation(options, CancellationToken::new(), None)
	}

	/// Create a pool whose lifetime is tied to an existing token
	pub fn with_cancellation(
		options: PoolOptions,
		cancel: CancellationToken,
		error_handler: Option<ErrorHandler>,
	) -> Self {
		let (tx, rx) = mpsc::channel::<Task>(options.queue_capacity.max(1));
		let (results_tx, results) = mpsc::unbounded_channel();
		let rx = Arc::new(Mutex::new(rx));
		let metrics = Arc::new(PoolMetrics::default());

		let ticker = options.rate_interval.map(|interval| {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			Arc::new(Mutex::new(ticker))
		});

		let mut workers = Vec::with_capacity(options.workers.max(1));
		for id in 0..options.workers.max(1) {
			workers.push(tokio::spawn(worker_loop(
				id,
				Arc::clone(&rx),
				results_tx.clone(),
				cancel.clone(),
				Arc::clone(&metrics),
				ticker.clone(),
				options.task_timeout,
				error_handler.clone(),
			)));
		}

		WorkerPool { tx, results, workers, cancel, metrics }
	}

	/// Enqueue a task
	///
	/// Blocks while the queue is full; fails once the pool is stopped.
	pub async fn submit(&self, task: Task) -> EnvyResult<()> {
		if self.cancel.is_cancelled() {
			return Err(EnvyError::new(ErrorKind::Internal, "Worker pool is stopped"));
		}
		self.tx
			.send(task)
			.await
			.map_err(|_| EnvyError::new(ErrorKind::Internal, "Worker pool is stopped"))
	}

	/// Cancel the pool
	///
	/// Queued tasks are discarded; in-flight tasks observe the
	/// cancellation on their next suspension point.
	pub fn stop(&self) {
		self.cancel.cancel();
	}

	pub fn metrics(&self) -> Arc<PoolMetrics> {
		Arc::clone(&self.metrics)
	}

	/// Close intake, drain the workers and collect every outcome
	///
	/// Outcome order is unspecified.
	pub async fn wait(self) -> Vec<TaskOutcome> {
		let WorkerPool { tx, mut results, workers, cancel: _cancel, metrics: _metrics } = self;
		drop(tx);

		for worker in workers {
			let _ = worker.await;
		}

		let mut outcomes = Vec::new();
		while let Ok(outcome) = results.try_recv() {
			outcomes.push(outcome);
		}
		outcomes
	}
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
	id: usize,
	rx: Arc<Mutex<mpsc::Receiver<Task>>>,
	results: mpsc::UnboundedSender<TaskOutcome>,
	cancel: CancellationToken,
	metrics: Arc<PoolMetrics>,
	ticker: Option<Arc<Mutex<tokio::time::Interval>>>,
	task_timeout: Option<Duration>,
	error_handler: Option<ErrorHandler>,
) {
	loop {
		let task = {
			let mut guard = rx.lock().await;
			tokio::select! {
				_ = cancel.cancelled() => None,
				task = guard.recv() => task,
			}
		};
		let task = match task {
			Some(task) => task,
			None => break,
		};

		// A stop between dequeue and execution discards the task
		if cancel.is_cancelled() {
			break;
		}

		if let Some(ticker) = &ticker {
			let mut guard = ticker.lock().await;
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = guard.tick() => {}
			}
		}

		let name = task.name.clone();
		let child = cancel.child_token();
		metrics.active.fetch_add(1, Ordering::Relaxed);
		let start = Instant::now();

		let result = match task_timeout {
			Some(limit) => match tokio::time::timeout(limit, task.run(child.clone())).await {
				Ok(result) => result,
				Err(_) => {
					child.cancel();
					Err(EnvyError::new(
						ErrorKind::Timeout,
						format!("Task '{}' timed out after {:?}", name, limit),
					)
					.retriable(true))
				}
			},
			None => task.run(child).await,
		};

		metrics.active.fetch_sub(1, Ordering::Relaxed);
		metrics.processed.fetch_add(1, Ordering::Relaxed);

		let outcome = TaskOutcome { name, error: result.err(), duration: start.elapsed() };
		if outcome.error.is_some() {
			metrics.failed.fetch_add(1, Ordering::Relaxed);
			if let Some(handler) = &error_handler {
				handler(&outcome);
			}
		}

		debug!(worker = id, task = %outcome.name, ok = outcome.is_ok(), "task finished");
		let _ = results.send(outcome);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicU32;

	#[tokio::test]
	async fn test_all_tasks_run() {
		let pool = WorkerPool::new(PoolOptions { workers: 4, ..Default::default() });
		let counter = Arc::new(AtomicU32::new(0));

		for i in 0..20 {
			let counter = Arc::clone(&counter);
			pool.submit(Task::new(format!("task-{}", i), move |_| async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}))
			.await
			.unwrap();
		}

		let outcomes = pool.wait().await;
		assert_eq!(outcomes.len(), 20);
		assert!(outcomes.iter().all(|o| o.is_ok()));
		assert_eq!(counter.load(Ordering::SeqCst), 20);
	}

	#[tokio::test]
	async fn test_metrics_track_failures() {
		let pool = WorkerPool::new(PoolOptions { workers: 2, ..Default::default() });
		let metrics = pool.metrics();

		pool.submit(Task::new("ok", |_| async { Ok(()) })).await.unwrap();
		pool.submit(Task::new("bad", |_| async {
			Err(EnvyError::new(ErrorKind::Internal, "boom"))
		}))
		.await
		.unwrap();

		let outcomes = pool.wait().await;
		assert_eq!(outcomes.len(), 2);
		assert_eq!(metrics.processed(), 2);
		assert_eq!(metrics.failed(), 1);
		assert_eq!(metrics.active(), 0);
	}

	#[tokio::test]
	async fn test_submit_fails_after_stop() {
		let pool = WorkerPool::new(PoolOptions::default());
		pool.stop();

		let err = pool
			.submit(Task::new("late", |_| async { Ok(()) }))
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::Internal);
	}

	#[tokio::test]
	async fn test_task_timeout() {
		let pool = WorkerPool::new(PoolOptions {
			workers: 1,
			task_timeout: Some(Duration::from_millis(20)),
			..Default::default()
		});

		pool.submit(Task::new("slow", |_| async {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}))
		.await
		.unwrap();

		let outcomes = pool.wait().await;
		assert_eq!(outcomes.len(), 1);
		let err = outcomes[0].error.as_ref().unwrap();
		assert_eq!(err.kind, ErrorKind::Timeout);
		assert!(err.is_retriable());
	}

	#[tokio::test]
	async fn test_stop_discards_queued_tasks() {
		// One worker busy on a long task; the queued task must be
		// discarded once the pool stops.
		let pool = WorkerPool::new(PoolOptions {
			workers: 1,
			queue_capacity: 8,
			task_timeout: None,
			rate_interval: None,
		});
		let ran = Arc::new(AtomicU32::new(0));

		pool.submit(Task::new("blocker", |token| async move {
			token.cancelled().await;
			Ok(())
		}))
		.await
		.unwrap();

		let ran_clone = Arc::clone(&ran);
		pool.submit(Task::new("queued", move |_| async move {
			ran_clone.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}))
		.await
		.unwrap();

		tokio::time::sleep(Duration::from_millis(20)).await;
		pool.stop();
		let _ = pool.wait().await;

		assert_eq!(ran.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_rate_interval_spaces_tasks() {
		let pool = WorkerPool::new(PoolOptions {
			workers: 4,
			queue_capacity: 16,
			task_timeout: None,
			rate_interval: Some(Duration::from_millis(50)),
		});

		for i in 0..5 {
			pool.submit(Task::new(format!("t{}", i), |_| async { Ok(()) })).await.unwrap();
		}

		let start = Instant::now();
		let outcomes = pool.wait().await;
		assert_eq!(outcomes.len(), 5);
		// First tick is immediate, the remaining four are spaced
		assert!(start.elapsed() >= Duration::from_millis(180));
	}

	#[tokio::test]
	async fn test_error_handler_invoked() {
		let seen = Arc::new(AtomicU32::new(0));
		let seen_clone = Arc::clone(&seen);
		let pool = WorkerPool::with_cancellation(
			PoolOptions { workers: 2, ..Default::default() },
			CancellationToken::new(),
			Some(Arc::new(move |_outcome: &TaskOutcome| {
				seen_clone.fetch_add(1, Ordering::SeqCst);
			})),
		);

		pool.submit(Task::new("bad", |_| async {
			Err(EnvyError::new(ErrorKind::Internal, "boom"))
		}))
		.await
		.unwrap();
		pool.submit(Task::new("ok", |_| async { Ok(()) })).await.unwrap();

		let _ = pool.wait().await;
		assert_eq!(seen.load(Ordering::SeqCst), 1);
	}
}

// vim: ts=4
