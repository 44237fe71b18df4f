//! Cancellation context shared by every unit of a run.
//!
//! A [`RunContext`] is a cheap, clonable handle. Children observe their
//! parent's cancellation and deadline; cancelling a child never affects the
//! parent. Cancellation is cooperative: the worker samples it before each
//! unit, and long-running units are expected to poll [`RunContext::err`]
//! themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ContextError;

#[derive(Debug)]
struct Inner {
    parent: Option<RunContext>,
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Cancellation and deadline scope for a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    inner: Arc<Inner>,
}

impl RunContext {
    /// A root context that is never done unless cancelled.
    #[must_use]
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: None,
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A child that can be cancelled independently of `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A child whose deadline is `timeout` from now (or the parent's, if sooner).
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline() {
            Some(parent) if parent < own => parent,
            _ => own,
        };
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Earliest deadline along the parent chain.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let parent = self.inner.parent.as_ref().and_then(Self::deadline);
        match (self.inner.deadline, parent) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Some(ContextError::Cancelled);
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(ContextError::DeadlineExceeded);
        }
        self.inner.parent.as_ref().and_then(Self::err)
    }

    /// Shorthand for `err().is_some()`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}
