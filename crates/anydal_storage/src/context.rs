//! Per-call deadline and cancellation.

use crate::error::{StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A shareable cancellation flag.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every call carrying this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation passed to every store call.
///
/// The DAO layer hands the caller's context to the store unchanged. A
/// context without a deadline inherits the connection's default timeout.
///
/// # Example
///
/// ```rust
/// use anydal_storage::{CallContext, CancelToken};
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let ctx = CallContext::with_timeout(Duration::from_secs(5)).with_cancel(token.clone());
/// assert!(ctx.check().is_ok());
///
/// token.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl CallContext {
    /// A context with no deadline and no cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context expiring at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the explicit deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the explicit deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Time a store may block on this call, falling back to `default`.
    #[must_use]
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.remaining().unwrap_or(default)
    }

    /// Fails if the call was cancelled or its deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Cancelled`] or [`StoreError::Timeout`].
    pub fn check(&self) -> StoreResult<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::Timeout),
            _ => Ok(()),
        }
    }
}
