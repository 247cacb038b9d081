//! Worker lane implementation
//!
//! Each [`Worker`] owns one bounded FIFO queue. A run-loop thread consumes
//! the queue while there is traffic; after `idle_timeout` without an item the
//! loop exits and the lane is *sleeping*. The next [`Worker::enqueue`] wakes
//! it by spawning a fresh run-loop. Cancellation of the lane's token ends the
//! current loop after the item in hand and prevents any further wake-up.
//!
//! # Sleep/wake handoff
//!
//! `pending` counts items announced by producers and not yet finished by the
//! loop. A producer increments `pending` *before* it inspects `sleeping`; a
//! loop that wants to sleep publishes `sleeping = true` *before* it inspects
//! `pending`. All four accesses are `SeqCst`, so at least one side observes
//! the other: either the producer sees `sleeping` and wakes the lane, or the
//! loop sees the pending item and stays (or defers to the successor the
//! producer already spawned). The `sleeping` compare-and-swap has exactly one
//! winner, so a lane never has two live consumers.

use crate::core::{BoxedJob, CancellationToken, PoolError, Result};
use crate::pool::hooks::{ErrorSink, LoopObserver};
use crossbeam_channel::{select, Receiver, Sender};
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Lifecycle state of a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// The pool has not been started; items are buffered
    Idle,
    /// A run-loop is consuming (or about to consume) the queue
    Running,
    /// No run-loop is live; the next item wakes the lane
    Sleeping,
    /// Cancellation observed; terminal
    Stopped,
}

/// Statistics for a lane
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Items accepted into the lane queue
    pub items_enqueued: AtomicU64,
    /// Items that completed successfully
    pub items_processed: AtomicU64,
    /// Items that returned an error
    pub items_failed: AtomicU64,
    /// Items that panicked
    pub items_panicked: AtomicU64,
    /// Total time spent executing items (microseconds)
    pub total_processing_time_us: AtomicU64,
    /// Run-loops started (initial start plus wake-ups)
    pub loops_started: AtomicU64,
    /// Times a sleeping lane was woken by a submission
    pub wakeups: AtomicU64,
    /// Times a run-loop went to sleep after its idle timeout
    pub sleeps: AtomicU64,
    /// Run-loops that found another loop already live on the lane
    pub overlapping_loops: AtomicU64,
}

impl WorkerStats {
    /// Create new lane statistics
    pub fn new() -> Self {
        Self::default()
    }

    fn add_processing_time(&self, elapsed: Duration) {
        self.total_processing_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get items accepted into the queue
    pub fn get_items_enqueued(&self) -> u64 {
        self.items_enqueued.load(Ordering::Relaxed)
    }

    /// Get items completed successfully
    pub fn get_items_processed(&self) -> u64 {
        self.items_processed.load(Ordering::Relaxed)
    }

    /// Get items that returned an error
    pub fn get_items_failed(&self) -> u64 {
        self.items_failed.load(Ordering::Relaxed)
    }

    /// Get items that panicked
    pub fn get_items_panicked(&self) -> u64 {
        self.items_panicked.load(Ordering::Relaxed)
    }

    /// Get run-loops started
    pub fn get_loops_started(&self) -> u64 {
        self.loops_started.load(Ordering::Relaxed)
    }

    /// Get wake-ups
    pub fn get_wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Relaxed)
    }

    /// Get idle sleeps
    pub fn get_sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::Relaxed)
    }

    /// Get overlapping run-loops detected (always zero unless the handoff is broken)
    pub fn get_overlapping_loops(&self) -> u64 {
        self.overlapping_loops.load(Ordering::Relaxed)
    }

    /// Get average execution time per finished item in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count =
            self.get_items_processed() + self.get_items_failed() + self.get_items_panicked();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// Settings a lane inherits from its pool
pub(crate) struct WorkerOptions {
    pub(crate) queue_capacity: usize,
    pub(crate) idle_timeout: Duration,
    pub(crate) pool_name: String,
    pub(crate) error_sink: ErrorSink,
    pub(crate) observer: Arc<dyn LoopObserver>,
}

/// Why a run-loop returned
enum LoopExit {
    Slept,
    Cancelled,
}

/// One lane of a dispatch pool
pub struct Worker {
    id: usize,
    sender: Sender<BoxedJob>,
    receiver: Receiver<BoxedJob>,
    capacity: usize,
    started: AtomicBool,
    running: CachePadded<AtomicBool>,
    sleeping: CachePadded<AtomicBool>,
    pending: CachePadded<AtomicUsize>,
    idle_timeout: Duration,
    pool_name: String,
    error_sink: ErrorSink,
    observer: Arc<dyn LoopObserver>,
    token: CancellationToken,
    stats: WorkerStats,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("capacity", &self.capacity)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl Worker {
    /// Create a lane; no run-loop is spawned until [`start`](Self::start)
    pub(crate) fn new(id: usize, token: CancellationToken, options: WorkerOptions) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(options.queue_capacity);
        Self {
            id,
            sender,
            receiver,
            capacity: options.queue_capacity,
            started: AtomicBool::new(false),
            running: CachePadded::new(AtomicBool::new(false)),
            sleeping: CachePadded::new(AtomicBool::new(false)),
            pending: CachePadded::new(AtomicUsize::new(0)),
            idle_timeout: options.idle_timeout,
            pool_name: options.pool_name,
            error_sink: options.error_sink,
            observer: options.observer,
            token,
            stats: WorkerStats::new(),
        }
    }

    /// Get lane ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get lane statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items waiting in the queue (approximate)
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Items announced by producers and not yet finished (queued, in flight,
    /// or about to be sent)
    pub fn outstanding(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// The lane's cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        if self.token.is_cancelled() {
            WorkerState::Stopped
        } else if !self.started.load(Ordering::Acquire) {
            WorkerState::Idle
        } else if self.sleeping.load(Ordering::SeqCst) {
            WorkerState::Sleeping
        } else {
            WorkerState::Running
        }
    }

    /// Whether a run-loop is currently live on this lane
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the lane's first run-loop. Called once by the pool.
    pub(crate) fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sleeping.store(false, Ordering::SeqCst);
        self.spawn_loop();
    }

    /// Queue an item, waking the lane if it is sleeping
    ///
    /// Blocks while the queue is full, until space frees up or the lane is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] if the lane's token is cancelled before
    /// the item could be queued. The item is dropped unexecuted.
    pub fn enqueue(self: &Arc<Self>, job: BoxedJob) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(PoolError::stopped(&self.pool_name));
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        self.wake();

        let sent = select! {
            send(self.sender, job) -> res => res.is_ok(),
            recv(self.token.cancelled()) -> _ => false,
        };

        if !sent {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::stopped(&self.pool_name));
        }

        self.stats.items_enqueued.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_submission(self.id, self.receiver.len());
        Ok(())
    }

    /// Sleeping → Running. Exactly one caller wins the CAS and spawns.
    fn wake(self: &Arc<Self>) {
        if !self.sleeping.load(Ordering::SeqCst) || self.token.is_cancelled() {
            return;
        }
        if self
            .sleeping
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.stats.wakeups.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            crate::telemetry::metrics::record_wake(self.id);
            self.spawn_loop();
        }
    }

    fn spawn_loop(self: &Arc<Self>) {
        let worker = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.pool_name, self.id))
            .spawn(move || worker.run());

        if let Err(e) = spawned {
            // No loop exists; let the next enqueue retry the wake-up.
            self.sleeping.store(true, Ordering::SeqCst);
            log::error!("worker {}: failed to spawn run-loop: {}", self.id, e);
            self.report(PoolError::spawn(self.id, e.to_string()));
        }
    }

    /// Run-loop body
    fn run(self: Arc<Self>) {
        #[cfg(feature = "tracing")]
        let lane_span = span!(Level::DEBUG, "lane", id = self.id);
        #[cfg(feature = "tracing")]
        let _guard = lane_span.enter();

        if self.running.swap(true, Ordering::SeqCst) {
            self.stats.overlapping_loops.fetch_add(1, Ordering::Relaxed);
            log::error!("worker {}: run-loop started while another is live", self.id);
        }
        self.stats.loops_started.fetch_add(1, Ordering::Relaxed);
        self.observer.on_loop_started(self.id);
        log::debug!("worker {}: run-loop started", self.id);

        let exit = loop {
            if self.token.is_cancelled() {
                break LoopExit::Cancelled;
            }

            select! {
                recv(self.receiver) -> msg => match msg {
                    Ok(job) => self.execute_job(job),
                    // The lane holds its own sender, so the queue never disconnects.
                    Err(_) => break LoopExit::Cancelled,
                },
                recv(self.token.cancelled()) -> _ => break LoopExit::Cancelled,
                default(self.idle_timeout) => {
                    if self.try_sleep() {
                        break LoopExit::Slept;
                    }
                }
            }
        };

        match exit {
            LoopExit::Slept => {
                self.stats.sleeps.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                crate::telemetry::metrics::record_sleep(self.id);
                log::debug!(
                    "worker {}: idle for {:?}, run-loop sleeping",
                    self.id,
                    self.idle_timeout
                );
                self.observer.on_loop_slept(self.id);
            }
            LoopExit::Cancelled => {
                self.running.store(false, Ordering::SeqCst);
                log::debug!(
                    "worker {}: run-loop stopped ({} items abandoned)",
                    self.id,
                    self.receiver.len()
                );
                self.observer.on_loop_stopped(self.id);
            }
        }
    }

    /// Running → Sleeping. Returns `false` if the loop must keep running.
    fn try_sleep(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        self.sleeping.store(true, Ordering::SeqCst);

        if self.pending.load(Ordering::SeqCst) == 0 {
            return true;
        }

        // An item was announced after the timer started. Reclaim the lane
        // unless its producer already won the CAS and spawned a successor.
        if self
            .sleeping
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.running.store(true, Ordering::SeqCst);
            false
        } else {
            true
        }
    }

    /// Execute a single item with panic containment
    fn execute_job(&self, mut job: BoxedJob) {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                self.stats.items_processed.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                crate::telemetry::metrics::record_completion(elapsed, true);
            }
            Ok(Err(e)) => {
                log::warn!("worker {}: {} failed: {}", self.id, job.job_type(), e);
                self.stats.items_failed.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                crate::telemetry::metrics::record_completion(elapsed, false);
                self.report(e);
            }
            Err(panic_info) => {
                let panic_msg = panic_message(&*panic_info);
                log::error!("worker {}: {} panicked: {}", self.id, job.job_type(), panic_msg);
                self.stats.items_panicked.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                crate::telemetry::metrics::record_panic(elapsed);
                self.report(PoolError::item_panicked(self.id, panic_msg));
            }
        }

        self.stats.add_processing_time(elapsed);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    /// Hand an error to the sink; a panicking sink must not kill the lane
    fn report(&self, error: PoolError) {
        let sink = &self.error_sink;
        if catch_unwind(AssertUnwindSafe(|| sink(error))).is_err() {
            log::error!("worker {}: error sink panicked", self.id);
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
