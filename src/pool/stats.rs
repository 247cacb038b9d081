//! Point-in-time statistics snapshots.
//!
//! [`PoolStats`] is a plain, serializable copy of the live counters kept by
//! each lane. Taking one never blocks the lanes.

use crate::core::{PoolError, Result};
use crate::pool::worker::{Worker, WorkerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of one lane
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatSnapshot {
    /// Lane index
    pub worker_id: usize,
    /// Lifecycle state at snapshot time
    pub state: WorkerState,
    /// Items waiting in the queue
    pub queued: usize,
    /// Items accepted into the queue
    pub items_enqueued: u64,
    /// Items completed successfully
    pub items_processed: u64,
    /// Items that returned an error
    pub items_failed: u64,
    /// Items that panicked
    pub items_panicked: u64,
    /// Run-loops started
    pub loops_started: u64,
    /// Sleeping → Running transitions triggered by submissions
    pub wakeups: u64,
    /// Running → Sleeping transitions after the idle timeout
    pub sleeps: u64,
    /// Average execution time per finished item (microseconds)
    pub avg_processing_time_us: f64,
}

impl WorkerStatSnapshot {
    pub(crate) fn capture(worker: &Worker) -> Self {
        let stats = worker.stats();
        Self {
            worker_id: worker.id(),
            state: worker.state(),
            queued: worker.queued(),
            items_enqueued: stats.get_items_enqueued(),
            items_processed: stats.get_items_processed(),
            items_failed: stats.get_items_failed(),
            items_panicked: stats.get_items_panicked(),
            loops_started: stats.get_loops_started(),
            wakeups: stats.get_wakeups(),
            sleeps: stats.get_sleeps(),
            avg_processing_time_us: stats.get_average_processing_time_us(),
        }
    }
}

/// Snapshot of a whole pool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Pool instance id
    pub pool_id: Uuid,
    /// Pool name (thread name prefix)
    pub name: String,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
    /// Queue capacity of every lane
    pub queue_capacity: usize,
    /// Successful submissions
    pub total_submitted: u64,
    /// Per-lane snapshots, indexed by lane
    pub workers: Vec<WorkerStatSnapshot>,
}

impl PoolStats {
    /// Items completed successfully across all lanes
    pub fn total_processed(&self) -> u64 {
        self.workers.iter().map(|w| w.items_processed).sum()
    }

    /// Items that returned an error across all lanes
    pub fn total_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.items_failed).sum()
    }

    /// Items that panicked across all lanes
    pub fn total_panicked(&self) -> u64 {
        self.workers.iter().map(|w| w.items_panicked).sum()
    }

    /// Items waiting in queues across all lanes
    pub fn total_queued(&self) -> usize {
        self.workers.iter().map(|w| w.queued).sum()
    }

    /// Number of lanes in `state`
    pub fn count_in_state(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state == state).count()
    }

    /// Serialize the snapshot as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PoolError::other(e.to_string()))
    }
}
