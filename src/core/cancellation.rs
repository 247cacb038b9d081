//! Cooperative cancellation shared between a pool and its lanes
//!
//! A [`CancellationToken`] is a cheap, cloneable flag with two ways to observe
//! it: a lock-free [`is_cancelled()`](CancellationToken::is_cancelled) check,
//! and a channel receiver ([`cancelled()`](CancellationToken::cancelled)) that
//! becomes ready once the token is cancelled, so a blocked thread can wait on
//! it inside `crossbeam_channel::select!` alongside its other events.
//!
//! Tokens form a hierarchy: the pool owns the parent and every worker owns a
//! [`child()`](CancellationToken::child). Cancelling the parent cancels every
//! child; cancelling a child leaves the parent and siblings untouched.
//!
//! # Example
//!
//! ```rust
//! use rust_lane_pool::CancellationToken;
//!
//! let parent = CancellationToken::new();
//! let child1 = parent.child();
//! let child2 = parent.child();
//!
//! child1.cancel();
//! assert!(!parent.is_cancelled());
//! assert!(!child2.is_cancelled());
//!
//! parent.cancel();
//! assert!(child2.is_cancelled());
//! ```

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via `cancel()` or `DispatchPool::stop()`
    Manual,
    /// Cancelled because the parent token was cancelled
    ParentCancelled,
    /// Cancelled at the end of `DispatchPool::drain()`
    Drained,
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::ParentCancelled => write!(f, "parent was cancelled"),
            CancellationReason::Drained => write!(f, "drained"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    children: RwLock<Vec<Weak<CancellationTokenInner>>>,
    reason: RwLock<Option<CancellationReason>>,
    // Nothing is ever sent; dropping the sender disconnects `done_rx`,
    // which wakes every receiver blocked on it.
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

impl CancellationTokenInner {
    fn new() -> Self {
        let (done_tx, done_rx) = crossbeam_channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            children: RwLock::new(Vec::new()),
            reason: RwLock::new(None),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
        }
    }
}

/// A thread-safe cancellation token
///
/// Clones share state: cancelling any clone cancels them all.
///
/// # Example
///
/// ```rust
/// use rust_lane_pool::CancellationToken;
/// use crossbeam_channel::select;
/// use std::thread;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let waiter = token.clone();
///
/// let handle = thread::spawn(move || {
///     select! {
///         recv(waiter.cancelled()) -> _ => "cancelled",
///         default(Duration::from_secs(10)) => "timed out",
///     }
/// });
///
/// token.cancel();
/// assert_eq!(handle.join().unwrap(), "cancelled");
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner::new()),
        }
    }

    /// Creates a child token linked to this parent
    ///
    /// The child is cancelled when the parent is cancelled. If the parent is
    /// already cancelled, the child is created cancelled.
    pub fn child(&self) -> Self {
        let child = CancellationToken::new();

        {
            let mut children = self.inner.children.write();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        if self.is_cancelled() {
            child.cancel_with_reason(CancellationReason::ParentCancelled);
        }

        child
    }

    /// Cancel this token with default reason (Manual)
    ///
    /// Idempotent: only the first call records a reason.
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token and all of its children with a specific reason
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.inner.reason.write() = Some(reason);
        drop(self.inner.done_tx.lock().take());

        let children = self.inner.children.read();
        for child_weak in children.iter() {
            if let Some(child_inner) = child_weak.upgrade() {
                let child_token = CancellationToken { inner: child_inner };
                child_token.cancel_with_reason(CancellationReason::ParentCancelled);
            }
        }
    }

    /// Check if this token has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the cancellation reason (if cancelled)
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled
    ///
    /// Intended for `crossbeam_channel::select!`; no value is ever delivered.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
