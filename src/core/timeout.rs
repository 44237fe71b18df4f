//! Deadline-enforcing decorator.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::warn;

use super::{AppResult, EngineError, Node, RunContext};
use crate::state::{Access, GuardState, SharedState};
use crate::worker::panic_message;

/// Vertex reported by a panic inside a decorated unit until the worker
/// attributes it.
const UNNAMED: &str = "<timeout>";

/// Runs the wrapped unit against a time budget.
///
/// The unit runs on its own thread with a child context that expires after
/// the budget. Its view of the state turns read-only as soon as that context
/// is done, so a unit that overruns cannot publish late writes. On expiry the
/// thread is not killed; it drains into a one-slot channel nobody reads.
/// A panic in the unit comes back as [`EngineError::Panic`].
pub struct Timeout {
    inner: Arc<dyn Node>,
    budget: Duration,
}

impl Timeout {
    /// Wrap `inner` with `budget`.
    pub fn new(inner: Arc<dyn Node>, budget: Duration) -> Self {
        Self { inner, budget }
    }

    /// Configured budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }
}

impl Node for Timeout {
    fn run(&self, ctx: &RunContext, state: &SharedState) -> AppResult<()> {
        let child = ctx.with_timeout(self.budget);

        let watched = child.clone();
        let guarded: SharedState = Arc::new(GuardState::new(Arc::clone(state), move |_| {
            if watched.is_done() {
                Access::READ
            } else {
                Access::ALL
            }
        }));

        let (tx, rx) = bounded::<AppResult<()>>(1);
        let inner = Arc::clone(&self.inner);
        let run_ctx = child.clone();
        thread::Builder::new()
            .name("dag-timeout".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| inner.run(&run_ctx, &guarded)))
                    .unwrap_or_else(|payload| {
                        Err(EngineError::Panic {
                            vertex: UNNAMED.into(),
                            message: panic_message(payload.as_ref()),
                        }
                        .into())
                    });
                let _ = tx.send(outcome);
            })?;

        match rx.recv_timeout(self.budget) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                child.cancel();
                warn!(budget = ?self.budget, "unit exceeded its time budget");
                Err(EngineError::Timeout {
                    budget: self.budget,
                }
                .into())
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow::anyhow!("unit thread exited without reporting a result"))
            }
        }
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }
}

impl std::fmt::Debug for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeout")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}
