//! Work items executed by the pool's lanes

use crate::core::error::{PoolError, Result};
use std::fmt;

/// A unit of work dispatched to one of the pool's lanes
///
/// `execute` runs exactly once, on the lane the item's key routes to. An
/// `Err` (or a panic) is handed to the pool's error sink; it never stops the
/// lane or affects other items.
pub trait Job: Send {
    /// Run the item
    fn execute(&mut self) -> Result<()>;

    /// Name used in log lines about this item
    fn job_type(&self) -> &str {
        "Job"
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.job_type())
    }
}

/// Type-erased item as stored in a lane queue
pub type BoxedJob = Box<dyn Job>;

impl<J: Job + ?Sized> Job for Box<J> {
    fn execute(&mut self) -> Result<()> {
        (**self).execute()
    }

    fn job_type(&self) -> &str {
        (**self).job_type()
    }
}

/// Adapts a `FnOnce` closure into a [`Job`]
pub struct ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    f: Option<F>,
    label: String,
}

impl<F> ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Wrap `f`; logged as `ClosureJob`
    pub fn new(f: F) -> Self {
        Self::with_name(f, "ClosureJob")
    }

    /// Wrap `f` under a custom log label
    pub fn with_name<S: Into<String>>(f: F, label: S) -> Self {
        Self {
            f: Some(f),
            label: label.into(),
        }
    }
}

impl<F> Job for ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn execute(&mut self) -> Result<()> {
        let f = self.f.take().ok_or_else(|| {
            PoolError::other(format!("{} executed twice", self.label))
        })?;
        f()
    }

    fn job_type(&self) -> &str {
        &self.label
    }
}
