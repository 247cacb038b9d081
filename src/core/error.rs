//! Error types for the dispatch pool

/// Result type for dispatch pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the dispatch pool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// The pool's cancellation signal has been raised
    #[error("Dispatch pool '{pool_name}' is already stopped")]
    Stopped {
        /// Name of the dispatch pool
        pool_name: String,
    },

    /// A work item reported failure
    #[error("Work item failed on worker #{worker_id}: {message}")]
    ExecutionError {
        /// Worker that ran the item
        worker_id: usize,
        /// Error message
        message: String,
    },

    /// A work item panicked while executing
    #[error("Work item panicked on worker #{worker_id}: {message}")]
    ItemPanicked {
        /// Worker that ran the item
        worker_id: usize,
        /// Panic message
        message: String,
    },

    /// Failed to spawn a run-loop thread
    #[error("Failed to spawn run-loop for worker #{worker_id}: {message}")]
    SpawnError {
        /// Worker whose loop could not be spawned
        worker_id: usize,
        /// Error message
        message: String,
    },

    /// Drain gave up before every lane emptied
    #[error("Drain timed out after {timeout_ms}ms with {remaining} items outstanding")]
    DrainTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
        /// Items still queued or executing when the deadline passed
        remaining: usize,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a stopped error
    pub fn stopped(pool_name: impl Into<String>) -> Self {
        PoolError::Stopped {
            pool_name: pool_name.into(),
        }
    }

    /// Create an execution error
    pub fn execution(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::ExecutionError {
            worker_id,
            message: message.into(),
        }
    }

    /// Create an item panic error
    pub fn item_panicked(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::ItemPanicked {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::SpawnError {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a drain timeout error
    pub fn drain_timeout(timeout_ms: u64, remaining: usize) -> Self {
        PoolError::DrainTimeout {
            timeout_ms,
            remaining,
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }

    /// Whether this error means the pool no longer accepts work
    pub fn is_stopped(&self) -> bool {
        matches!(self, PoolError::Stopped { .. })
    }
}
