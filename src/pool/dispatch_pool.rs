//! Keyed dispatch pool implementation

use crate::core::{CancellationReason, CancellationToken, ClosureJob, Job, PoolError, Result};
use crate::pool::hooks::{discard_errors, ErrorSink, LoopObserver, NoopObserver};
use crate::pool::router;
use crate::pool::stats::{PoolStats, WorkerStatSnapshot};
use crate::pool::worker::{Worker, WorkerOptions, WorkerState};
use crate::telemetry::TracedJob;
use chrono::Utc;
use crossbeam_utils::Backoff;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Idle period after which a lane's run-loop exits
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default pool name, used as the run-loop thread name prefix
pub const DEFAULT_POOL_NAME: &str = "lane";

/// Configuration for a dispatch pool
#[derive(Clone)]
pub struct PoolConfig {
    /// Number of lanes (must be > 0)
    pub worker_count: usize,
    /// Capacity of each lane's queue (must be > 0)
    pub queue_capacity: usize,
    /// Idle period after which a lane's run-loop exits.
    /// Default: 5 minutes
    pub idle_timeout: Duration,
    /// Pool name; run-loop threads are named `{name}-{lane}`
    pub name: String,
    error_sink: ErrorSink,
    observer: Arc<dyn LoopObserver>,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("idle_timeout", &self.idle_timeout)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PoolConfig {
    /// Create a configuration with `worker_count` lanes of `queue_capacity` each
    #[must_use]
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        Self {
            worker_count,
            queue_capacity,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            name: DEFAULT_POOL_NAME.to_string(),
            error_sink: discard_errors(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set the idle timeout for every lane
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the callback receiving every work item failure
    ///
    /// The sink runs inline on the lane that executed the item and may be
    /// called from several lanes at once.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(PoolError) + Send + Sync + 'static,
    {
        self.error_sink = Arc::new(sink);
        self
    }

    /// Set the run-loop lifecycle observer
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the pool name (run-loop thread name prefix)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(PoolError::invalid_config(
                "worker_count",
                "Number of workers must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::invalid_config(
                "queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(PoolError::invalid_config(
                "idle_timeout",
                "Idle timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Serializable subset of [`PoolConfig`]
///
/// ```rust
/// use rust_lane_pool::prelude::*;
///
/// # fn main() -> Result<()> {
/// let settings = PoolSettings::from_json(r#"{"worker_count": 8, "queue_capacity": 512}"#)?;
/// let pool = DispatchPool::with_config(settings.into_config())?;
/// assert_eq!(pool.worker_count(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Number of lanes
    pub worker_count: usize,
    /// Capacity of each lane's queue
    pub queue_capacity: usize,
    /// Idle timeout in milliseconds
    #[serde(default = "PoolSettings::default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Pool name
    #[serde(default = "PoolSettings::default_name")]
    pub name: String,
}

impl PoolSettings {
    fn default_idle_timeout_ms() -> u64 {
        DEFAULT_IDLE_TIMEOUT.as_millis() as u64
    }

    fn default_name() -> String {
        DEFAULT_POOL_NAME.to_string()
    }

    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PoolError::invalid_config("settings", e.to_string()))
    }

    /// Build a [`PoolConfig`] with the default error sink and observer
    #[must_use]
    pub fn into_config(self) -> PoolConfig {
        PoolConfig::new(self.worker_count, self.queue_capacity)
            .with_idle_timeout(Duration::from_millis(self.idle_timeout_ms))
            .with_name(self.name)
    }
}

impl From<PoolSettings> for PoolConfig {
    fn from(settings: PoolSettings) -> Self {
        settings.into_config()
    }
}

/// Admission ticket held for the duration of one `submit`, so `drain` can
/// wait out submissions that passed the admission check.
struct SubmitGuard<'a>(&'a AtomicUsize);

impl<'a> SubmitGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fixed set of worker lanes fed by key
///
/// Items submitted under the same key always land on the same lane and run
/// in submission order; distinct keys spread across lanes. Lanes whose
/// run-loop sees no traffic for the idle timeout release their thread and
/// are woken by the next submission.
///
/// # Shutdown
///
/// [`stop()`](Self::stop) cancels immediately: each lane finishes the item
/// in hand and queued items are abandoned. [`drain()`](Self::drain) first
/// waits for queued items to finish. Dropping the pool stops it.
pub struct DispatchPool {
    id: Uuid,
    config: PoolConfig,
    workers: Vec<Arc<Worker>>,
    token: CancellationToken,
    started: AtomicBool,
    accepting: AtomicBool,
    submitters: AtomicUsize,
    total_submitted: AtomicU64,
}

impl std::fmt::Debug for DispatchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPool")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("stopped", &self.token.is_cancelled())
            .field(
                "total_submitted",
                &self.total_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl DispatchPool {
    /// Create a pool with `worker_count` lanes of `queue_capacity` each
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] if either count is zero.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(worker_count, queue_capacity))
    }

    /// Create a pool with custom configuration
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        Self::build(config, CancellationToken::new())
    }

    /// Create a pool whose cancellation is derived from `parent`
    ///
    /// Cancelling `parent` stops the pool as if [`stop()`](Self::stop) had
    /// been called.
    pub fn with_parent_token(config: PoolConfig, parent: &CancellationToken) -> Result<Self> {
        Self::build(config, parent.child())
    }

    fn build(config: PoolConfig, token: CancellationToken) -> Result<Self> {
        config.validate()?;

        let workers = (0..config.worker_count)
            .map(|id| {
                Arc::new(Worker::new(
                    id,
                    token.child(),
                    WorkerOptions {
                        queue_capacity: config.queue_capacity,
                        idle_timeout: config.idle_timeout,
                        pool_name: config.name.clone(),
                        error_sink: Arc::clone(&config.error_sink),
                        observer: Arc::clone(&config.observer),
                    },
                ))
            })
            .collect();

        let id = Uuid::new_v4();
        log::debug!(
            "dispatch pool '{}' ({}) created: {} lanes x {} slots, idle timeout {:?}",
            config.name,
            id,
            config.worker_count,
            config.queue_capacity,
            config.idle_timeout
        );

        Ok(Self {
            id,
            config,
            workers,
            token,
            started: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
            submitters: AtomicUsize::new(0),
            total_submitted: AtomicU64::new(0),
        })
    }

    /// Start every lane's run-loop
    ///
    /// Idempotent: calls after the first are no-ops. Items submitted before
    /// `start()` are buffered and run once the lanes start.
    ///
    /// # Errors
    ///
    /// [`PoolError::Stopped`] if the pool has already been stopped.
    pub fn start(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(PoolError::stopped(&self.config.name));
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        for worker in &self.workers {
            worker.start();
        }

        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_pool_start(
            self.config.worker_count,
            self.config.queue_capacity,
        );
        log::info!(
            "dispatch pool '{}' started with {} lanes",
            self.config.name,
            self.config.worker_count
        );
        Ok(())
    }

    /// Submit a job under `key`
    ///
    /// Returns once the job is queued on its lane; it runs later. Blocks
    /// while that lane's queue is full.
    ///
    /// # Errors
    ///
    /// [`PoolError::Stopped`] if the pool was stopped (or is draining)
    /// before the job could be queued. The job is dropped unexecuted.
    pub fn submit<J: Job + 'static>(&self, key: &str, job: J) -> Result<()> {
        let _guard = SubmitGuard::enter(&self.submitters);
        if self.token.is_cancelled() || !self.accepting.load(Ordering::SeqCst) {
            return Err(PoolError::stopped(&self.config.name));
        }

        let worker = &self.workers[self.worker_for(key)];
        worker.enqueue(Box::new(job))?;

        self.total_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Submit a closure under `key`
    pub fn execute<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(key, ClosureJob::new(f))
    }

    /// Submit a job that runs inside the caller's current tracing span
    pub fn submit_traced<J: Job + 'static>(&self, key: &str, job: J) -> Result<()> {
        self.submit(key, TracedJob::new(job))
    }

    /// Raise the pool's cancellation signal
    ///
    /// Lanes finish the item in hand and exit; queued items are abandoned.
    /// Idempotent. Does not wait for run-loops to exit.
    pub fn stop(&self) {
        self.cancel(CancellationReason::Manual);
    }

    /// Stop accepting work, wait for queued items to finish, then stop
    ///
    /// Lanes that were never started are started so buffered items can run.
    /// Cancellation is raised whether or not the lanes emptied in time.
    ///
    /// # Errors
    ///
    /// [`PoolError::DrainTimeout`] if items were still queued or running
    /// when `timeout` elapsed; those items are abandoned.
    pub fn drain(&self, timeout: Duration) -> Result<()> {
        if self.token.is_cancelled() {
            return Ok(());
        }

        self.accepting.store(false, Ordering::SeqCst);
        self.start()?;
        log::info!(
            "dispatch pool '{}' draining {} items",
            self.config.name,
            self.outstanding()
        );

        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        let result = loop {
            let remaining = self.outstanding();
            if remaining == 0 && self.submitters.load(Ordering::SeqCst) == 0 {
                break Ok(());
            }
            if Instant::now() >= deadline {
                break Err(PoolError::drain_timeout(
                    timeout.as_millis() as u64,
                    remaining,
                ));
            }
            if backoff.is_completed() {
                thread::sleep(Duration::from_millis(1));
            } else {
                backoff.snooze();
            }
        };

        if let Err(e) = &result {
            log::warn!("dispatch pool '{}': {}", self.config.name, e);
        }
        self.cancel(CancellationReason::Drained);
        result
    }

    fn cancel(&self, reason: CancellationReason) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel_with_reason(reason);

        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_pool_stop(
            self.total_processed(),
            self.total_failed(),
            self.queued_items(),
        );
        log::info!(
            "dispatch pool '{}' stopped ({} items abandoned in queues)",
            self.config.name,
            self.queued_items()
        );
    }

    /// Pool instance id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of lanes
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Capacity of each lane's queue
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Idle timeout of every lane
    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    /// Lane that handles `key`
    pub fn worker_for(&self, key: &str) -> usize {
        router::route(key, self.workers.len())
    }

    /// Whether `start()` has been called
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Whether the pool's cancellation signal has been raised
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The pool-level cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Lanes, indexed by lane id
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Current state of every lane
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(|w| w.state()).collect()
    }

    /// Items waiting in queues across all lanes (approximate)
    pub fn queued_items(&self) -> usize {
        self.workers.iter().map(|w| w.queued()).sum()
    }

    fn outstanding(&self) -> usize {
        self.workers.iter().map(|w| w.outstanding()).sum()
    }

    /// Successful submissions
    pub fn total_submitted(&self) -> u64 {
        self.total_submitted.load(Ordering::Relaxed)
    }

    /// Items completed successfully across all lanes
    pub fn total_processed(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.stats().get_items_processed())
            .sum()
    }

    /// Items that returned an error across all lanes
    pub fn total_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.stats().get_items_failed()).sum()
    }

    /// Items that panicked across all lanes
    pub fn total_panicked(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.stats().get_items_panicked())
            .sum()
    }

    /// Snapshot of pool and lane statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pool_id: self.id,
            name: self.config.name.clone(),
            taken_at: Utc::now(),
            queue_capacity: self.config.queue_capacity,
            total_submitted: self.total_submitted(),
            workers: self
                .workers
                .iter()
                .map(|w| WorkerStatSnapshot::capture(w))
                .collect(),
        }
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::hooks::LoopCounters;
    use parking_lot::Mutex;

    fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_pool_creation() {
        let pool = DispatchPool::new(4, 16).expect("Failed to create pool");
        assert_eq!(pool.worker_count(), 4);
        assert_eq!(pool.queue_capacity(), 16);
        assert_eq!(pool.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
        assert!(!pool.is_started());
        assert!(pool
            .worker_states()
            .iter()
            .all(|s| *s == WorkerState::Idle));

        pool.start().expect("Failed to start pool");
        assert!(pool.is_started());
        assert!(pool
            .worker_states()
            .iter()
            .all(|s| *s == WorkerState::Running));

        pool.stop();
        assert!(pool.is_stopped());
        assert!(pool
            .worker_states()
            .iter()
            .all(|s| *s == WorkerState::Stopped));
    }

    #[test]
    fn test_invalid_construction() {
        let err = DispatchPool::new(0, 16).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { ref parameter, .. } if parameter == "worker_count"));

        let err = DispatchPool::new(4, 0).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { ref parameter, .. } if parameter == "queue_capacity"));

        let config = PoolConfig::new(1, 1).with_idle_timeout(Duration::ZERO);
        let err = DispatchPool::with_config(config).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { ref parameter, .. } if parameter == "idle_timeout"));
    }

    #[test]
    fn test_start_is_idempotent() {
        let counters = Arc::new(LoopCounters::new());
        let config = PoolConfig::new(3, 8).with_observer(counters.clone());
        let pool = DispatchPool::with_config(config).expect("Failed to create pool");

        pool.start().expect("Failed to start pool");
        pool.start().expect("Second start should be a no-op");
        pool.start().expect("Third start should be a no-op");

        assert!(wait_until(Duration::from_secs(2), || counters.started() == 3));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counters.started(), 3);
        assert!(pool
            .workers()
            .iter()
            .all(|w| w.stats().get_overlapping_loops() == 0));
    }

    #[test]
    fn test_start_after_stop_fails() {
        let pool = DispatchPool::new(2, 8).expect("Failed to create pool");
        pool.stop();
        assert!(matches!(pool.start(), Err(PoolError::Stopped { .. })));
    }

    #[test]
    fn test_job_execution() {
        let pool = DispatchPool::new(2, 16).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..10 {
            let counter_clone = Arc::clone(&counter);
            pool.execute(&format!("id-{}", i), move || {
                counter_clone.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .expect("Failed to submit job");
        }

        assert!(wait_until(Duration::from_secs(2), || {
            counter.load(Ordering::Relaxed) == 10
        }));
        assert_eq!(pool.total_submitted(), 10);
        assert!(wait_until(Duration::from_secs(2), || pool.total_processed() == 10));
    }

    #[test]
    fn test_same_key_same_worker() {
        let pool = DispatchPool::new(8, 16).expect("Failed to create pool");
        let lane = pool.worker_for("order-17");
        for _ in 0..10 {
            assert_eq!(pool.worker_for("order-17"), lane);
        }
        assert_eq!(lane, router::route("order-17", 8));
    }

    #[test]
    fn test_submit_before_start_is_buffered() {
        let pool = DispatchPool::new(2, 16).expect("Failed to create pool");
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            let counter_clone = Arc::clone(&counter);
            pool.execute(&format!("k{}", i), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("Failed to submit job");
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(pool.queued_items(), 5);

        pool.start().expect("Failed to start pool");
        assert!(wait_until(Duration::from_secs(2), || {
            counter.load(Ordering::SeqCst) == 5
        }));
    }

    #[test]
    fn test_submit_after_stop() {
        let pool = DispatchPool::new(2, 16).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");
        pool.stop();

        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = Arc::clone(&executed);
        let result = pool.execute("k", move || {
            executed_clone.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(result, Err(PoolError::Stopped { .. })));
        thread::sleep(Duration::from_millis(50));
        assert!(!executed.load(Ordering::SeqCst));
        assert_eq!(pool.total_submitted(), 0);
    }

    #[test]
    fn test_error_sink_receives_failures() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = Arc::clone(&errors);
        let config =
            PoolConfig::new(2, 16).with_error_sink(move |e| errors_clone.lock().push(e));
        let pool = DispatchPool::with_config(config).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        for i in 0..10 {
            pool.execute(&format!("id-{}", i), move || {
                if i % 2 == 0 {
                    Err(PoolError::other(format!("item {} failed", i)))
                } else {
                    Ok(())
                }
            })
            .expect("Failed to submit job");
        }

        assert!(wait_until(Duration::from_secs(2), || errors.lock().len() == 5));
        assert!(wait_until(Duration::from_secs(2), || pool.total_processed() == 5));
        assert_eq!(pool.total_failed(), 5);
    }

    #[test]
    fn test_panic_is_contained() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = Arc::clone(&errors);
        let config = PoolConfig::new(1, 16).with_error_sink(move |e| errors_clone.lock().push(e));
        let pool = DispatchPool::with_config(config).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        pool.execute("k", || panic!("Intentional panic for testing"))
            .expect("Failed to submit job");
        let after = Arc::new(AtomicBool::new(false));
        let after_clone = Arc::clone(&after);
        pool.execute("k", move || {
            after_clone.store(true, Ordering::SeqCst);
            Ok(())
        })
        .expect("Failed to submit job");

        assert!(wait_until(Duration::from_secs(2), || after.load(Ordering::SeqCst)));
        assert_eq!(pool.total_panicked(), 1);
        assert!(matches!(
            errors.lock().first(),
            Some(PoolError::ItemPanicked { worker_id: 0, .. })
        ));
    }

    #[test]
    fn test_drain_runs_queued_items() {
        let pool = DispatchPool::new(2, 64).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..50 {
            let counter_clone = Arc::clone(&counter);
            pool.execute(&format!("id-{}", i), move || {
                thread::sleep(Duration::from_millis(1));
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("Failed to submit job");
        }

        pool.drain(Duration::from_secs(5)).expect("Drain should finish");
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert!(pool.is_stopped());
        assert_eq!(
            pool.token().reason(),
            Some(CancellationReason::Drained)
        );
        assert!(matches!(
            pool.execute("late", || Ok(())),
            Err(PoolError::Stopped { .. })
        ));
    }

    #[test]
    fn test_drain_starts_idle_pool() {
        let pool = DispatchPool::new(2, 8).expect("Failed to create pool");
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        pool.execute("k", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("Failed to submit job");

        pool.drain(Duration::from_secs(2)).expect("Drain should finish");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drain_timeout() {
        let pool = DispatchPool::new(1, 8).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        pool.execute("k", move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            Ok(())
        })
        .expect("Failed to submit job");
        pool.execute("k", || Ok(())).expect("Failed to submit job");

        let result = pool.drain(Duration::from_millis(50));
        assert!(
            matches!(result, Err(PoolError::DrainTimeout { remaining, .. }) if remaining >= 1),
            "Expected DrainTimeout, got: {:?}",
            result
        );
        assert!(pool.is_stopped());
        drop(release_tx);
    }

    #[test]
    fn test_parent_token_stops_pool() {
        let parent = CancellationToken::new();
        let pool = DispatchPool::with_parent_token(PoolConfig::new(2, 8), &parent)
            .expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        parent.cancel();
        assert!(pool.is_stopped());
        assert!(matches!(
            pool.execute("k", || Ok(())),
            Err(PoolError::Stopped { .. })
        ));
    }

    #[test]
    fn test_stats_snapshot() {
        let pool = DispatchPool::with_config(PoolConfig::new(3, 8).with_name("billing"))
            .expect("Failed to create pool");
        pool.start().expect("Failed to start pool");
        for i in 0..9 {
            pool.execute(&format!("id-{}", i), || Ok(()))
                .expect("Failed to submit job");
        }
        assert!(wait_until(Duration::from_secs(2), || pool.total_processed() == 9));

        let stats = pool.stats();
        assert_eq!(stats.pool_id, pool.id());
        assert_eq!(stats.name, "billing");
        assert_eq!(stats.workers.len(), 3);
        assert_eq!(stats.total_submitted, 9);
        assert_eq!(stats.total_processed(), 9);
        assert_eq!(stats.count_in_state(WorkerState::Running), 3);
        assert!(stats.to_json().expect("Failed to serialize").contains("billing"));
    }

    #[test]
    fn test_settings_from_json() {
        let settings = PoolSettings::from_json(
            r#"{"worker_count": 4, "queue_capacity": 100, "idle_timeout_ms": 250, "name": "jobs"}"#,
        )
        .expect("Failed to parse settings");
        let config: PoolConfig = settings.into();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.idle_timeout, Duration::from_millis(250));
        assert_eq!(config.name, "jobs");

        let defaults = PoolSettings::from_json(r#"{"worker_count": 1, "queue_capacity": 1}"#)
            .expect("Failed to parse settings");
        assert_eq!(defaults.idle_timeout_ms, 300_000);
        assert_eq!(defaults.name, DEFAULT_POOL_NAME);

        let err = PoolSettings::from_json(r#"{"worker_count": 1}"#).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { .. }));
    }
}
