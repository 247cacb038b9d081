//! Pluggable callbacks shared by every lane of a pool
//!
//! - [`ErrorSink`]: receives every error a work item reports (and every
//!   contained panic). Invoked inline on the lane's thread, concurrently from
//!   different lanes.
//! - [`LoopObserver`]: notified whenever a lane's run-loop starts, goes to
//!   sleep after its idle timeout, or stops on cancellation.

use crate::core::PoolError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared callback receiving work item failures
pub type ErrorSink = Arc<dyn Fn(PoolError) + Send + Sync>;

/// The default sink: failures are logged by the lane and otherwise dropped
pub fn discard_errors() -> ErrorSink {
    Arc::new(|_| {})
}

/// Observer of run-loop lifecycle events
///
/// All methods default to no-ops so implementors only override what they
/// need. Calls come from lane threads and must not block for long.
pub trait LoopObserver: Send + Sync {
    /// A run-loop began consuming the lane's queue
    fn on_loop_started(&self, _worker_id: usize) {}

    /// A run-loop exited after its idle timeout; the lane is now sleeping
    fn on_loop_slept(&self, _worker_id: usize) {}

    /// A run-loop exited because the lane's cancellation token fired
    fn on_loop_stopped(&self, _worker_id: usize) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LoopObserver for NoopObserver {}

/// Observer counting lifecycle events across all lanes
///
/// # Example
///
/// ```rust
/// use rust_lane_pool::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let counters = Arc::new(LoopCounters::new());
/// let config = PoolConfig::new(4, 16).with_observer(counters.clone());
/// let pool = DispatchPool::with_config(config)?;
/// pool.start()?;
/// pool.stop();
/// # std::thread::sleep(std::time::Duration::from_millis(100));
/// assert_eq!(counters.started(), 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct LoopCounters {
    started: AtomicU64,
    slept: AtomicU64,
    stopped: AtomicU64,
}

impl LoopCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Run-loops started so far
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Run-loops that exited into the sleeping state
    pub fn slept(&self) -> u64 {
        self.slept.load(Ordering::SeqCst)
    }

    /// Run-loops that exited on cancellation
    pub fn stopped(&self) -> u64 {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Run-loops currently live (started but not yet exited)
    pub fn live(&self) -> u64 {
        self.started()
            .saturating_sub(self.slept())
            .saturating_sub(self.stopped())
    }
}

impl LoopObserver for LoopCounters {
    fn on_loop_started(&self, _worker_id: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_loop_slept(&self, _worker_id: usize) {
        self.slept.fetch_add(1, Ordering::SeqCst);
    }

    fn on_loop_stopped(&self, _worker_id: usize) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}
