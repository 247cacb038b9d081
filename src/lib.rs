//! # Rust Lane Pool
//!
//! A keyed task-dispatch pool: a fixed set of worker lanes, each with its
//! own bounded FIFO queue, fed by a string key.
//!
//! ## Features
//!
//! - **Key affinity**: items with the same key always run on the same lane,
//!   in submission order (FNV-1a routing)
//! - **Backpressure**: submitting to a full lane blocks until it drains or
//!   the pool stops
//! - **Idle release**: a lane with no traffic for the idle timeout releases
//!   its thread and is woken by the next submission
//! - **Cancellation**: one signal stops every lane; pools can be nested under
//!   a parent [`CancellationToken`]
//! - **Failure containment**: errors and panics from work items go to an
//!   error sink instead of killing the lane
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_lane_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let pool = DispatchPool::new(4, 1024)?;
//! pool.start()?;
//!
//! for i in 0..10 {
//!     pool.execute(&format!("user-{}", i % 3), move || {
//!         println!("item {} executing", i);
//!         Ok(())
//!     })?;
//! }
//!
//! // Wait for queued items, then stop
//! pool.drain(Duration::from_secs(5))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rust_lane_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = PoolConfig::new(8, 256)
//!     .with_idle_timeout(Duration::from_secs(30))
//!     .with_name("orders")
//!     .with_error_sink(|e| eprintln!("item failed: {}", e));
//!
//! let pool = DispatchPool::with_config(config)?;
//! pool.start()?;
//! # pool.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Jobs
//!
//! ```rust
//! use rust_lane_pool::prelude::*;
//!
//! struct Settle {
//!     account: String,
//! }
//!
//! impl Job for Settle {
//!     fn execute(&mut self) -> Result<()> {
//!         println!("settling {}", self.account);
//!         Ok(())
//!     }
//!
//!     fn job_type(&self) -> &str {
//!         "Settle"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let pool = DispatchPool::new(2, 16)?;
//! # pool.start()?;
//! let account = "acct-7".to_string();
//! pool.submit(&account, Settle { account: account.clone() })?;
//! # pool.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Statistics
//!
//! ```rust
//! use rust_lane_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! # let pool = DispatchPool::new(2, 16)?;
//! # pool.start()?;
//! # for i in 0..10 {
//! #     pool.execute(&i.to_string(), || Ok(()))?;
//! # }
//! # std::thread::sleep(std::time::Duration::from_millis(100));
//! let stats = pool.stats();
//! for lane in &stats.workers {
//!     println!("lane {} ({:?}): {} processed", lane.worker_id, lane.state, lane.items_processed);
//! }
//! println!("{}", stats.to_json()?);
//! # pool.stop();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod telemetry;

pub use core::{BoxedJob, CancellationToken, ClosureJob, Job, PoolError, Result};
pub use pool::{DispatchPool, PoolConfig, WorkerState, WorkerStats};
