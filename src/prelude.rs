//! Convenient re-exports for common types and traits

pub use crate::core::{
    BoxedJob, CancellationReason, CancellationToken, ClosureJob, Job, PoolError, Result,
};
pub use crate::pool::{
    DispatchPool, LoopCounters, LoopObserver, PoolConfig, PoolSettings, PoolStats, WorkerState,
};
pub use crate::telemetry::TracedJob;
