//! Dispatch pool, lanes and key routing

pub mod dispatch_pool;
pub mod hooks;
pub mod router;
pub mod stats;
pub mod worker;

pub use dispatch_pool::{DispatchPool, PoolConfig, PoolSettings, DEFAULT_IDLE_TIMEOUT};
pub use hooks::{discard_errors, ErrorSink, LoopCounters, LoopObserver, NoopObserver};
pub use router::route;
pub use stats::{PoolStats, WorkerStatSnapshot};
pub use worker::{Worker, WorkerState, WorkerStats};
