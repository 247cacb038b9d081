//! Core types and traits for the dispatch pool

pub mod cancellation;
pub mod error;
pub mod job;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{PoolError, Result};
pub use job::{BoxedJob, ClosureJob, Job};
