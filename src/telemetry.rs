//! Tracing integration for observability.
//!
//! With the `tracing` feature enabled every run-loop executes inside a
//! `lane` span and the [`metrics`] functions emit counter/gauge events that a
//! subscriber can turn into metrics. Without the feature [`TracedJob`] is a
//! transparent wrapper and nothing is emitted.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_lane_pool::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("rust_lane_pool=debug".parse().unwrap()))
//!     .init();
//!
//! let pool = DispatchPool::new(4, 1024)?;
//! pool.start()?;
//!
//! // The current span is re-entered on the lane that runs the job
//! pool.submit_traced("user-42", MyJob::new())?;
//! ```

use crate::core::{Job, Result};

/// A job wrapper that carries the submitter's tracing span onto the lane.
///
/// The span current at construction time is entered while the job executes,
/// so events emitted by the job nest under the request that submitted it.
pub struct TracedJob<J: Job> {
    inner: J,
    #[cfg(feature = "tracing")]
    span: ::tracing::Span,
}

impl<J: Job> TracedJob<J> {
    /// Wraps `job`, capturing the current span.
    pub fn new(job: J) -> Self {
        Self {
            inner: job,
            #[cfg(feature = "tracing")]
            span: ::tracing::Span::current(),
        }
    }

    /// Wraps `job` with an explicit span.
    #[cfg(feature = "tracing")]
    pub fn with_span(job: J, span: ::tracing::Span) -> Self {
        Self { inner: job, span }
    }
}

impl<J: Job> Job for TracedJob<J> {
    fn execute(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _guard = self.span.enter();
        self.inner.execute()
    }

    fn job_type(&self) -> &str {
        self.inner.job_type()
    }
}

/// Metric events for lanes and the pool.
#[cfg(feature = "tracing")]
pub mod metrics {
    use std::time::Duration;

    /// Records an item accepted into a lane queue.
    #[inline]
    pub fn record_submission(worker_id: usize, queue_depth: usize) {
        ::tracing::trace!(
            counter.items_submitted = 1,
            gauge.queue_depth = queue_depth as i64,
            worker_id = worker_id,
            "item submitted"
        );
    }

    /// Records item completion with timing.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            ::tracing::trace!(
                counter.items_completed = 1,
                histogram.item_duration_ms = duration_ms,
                "item completed"
            );
        } else {
            ::tracing::trace!(
                counter.items_failed = 1,
                histogram.item_duration_ms = duration_ms,
                "item failed"
            );
        }
    }

    /// Records a contained item panic.
    #[inline]
    pub fn record_panic(duration: Duration) {
        ::tracing::trace!(
            counter.items_panicked = 1,
            histogram.item_duration_ms = duration.as_millis() as u64,
            "item panicked"
        );
    }

    /// Records a sleeping lane being woken by a submission.
    #[inline]
    pub fn record_wake(worker_id: usize) {
        ::tracing::trace!(
            counter.lane_wakeups = 1,
            gauge.lanes_live = 1,
            worker_id = worker_id,
            "lane woken"
        );
    }

    /// Records a lane going to sleep after its idle timeout.
    #[inline]
    pub fn record_sleep(worker_id: usize) {
        ::tracing::trace!(
            counter.lane_sleeps = 1,
            gauge.lanes_live = -1i64,
            worker_id = worker_id,
            "lane sleeping"
        );
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(num_workers: usize, queue_capacity: usize) {
        ::tracing::info!(
            workers = num_workers,
            queue_capacity = queue_capacity,
            "dispatch pool started"
        );
    }

    /// Records pool cancellation.
    #[inline]
    pub fn record_pool_stop(items_processed: u64, items_failed: u64, items_queued: usize) {
        ::tracing::info!(
            items_processed = items_processed,
            items_failed = items_failed,
            items_abandoned = items_queued,
            "dispatch pool stopped"
        );
    }
}
