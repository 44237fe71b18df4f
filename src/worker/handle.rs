//! Handle to a run executing on a background thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{panic_message, PauseGate, WorkParams};
use crate::core::{EngineError, RunContext};

/// Controls a run started with [`Worker::spawn`](super::Worker::spawn).
#[derive(Debug)]
pub struct RunHandle {
    gate: Arc<PauseGate>,
    ctx: RunContext,
    thread: JoinHandle<Result<(), EngineError>>,
}

impl RunHandle {
    /// Start `run` on a `dag-run` thread under a child of `ctx`.
    ///
    /// `params` gets a pause gate when it carries none, so the handle can
    /// always pause and resume the run.
    pub(crate) fn spawn<F>(
        ctx: &RunContext,
        mut params: WorkParams,
        run: F,
    ) -> Result<Self, EngineError>
    where
        F: FnOnce(&RunContext, WorkParams) -> Result<(), EngineError> + Send + 'static,
    {
        let gate = Arc::clone(params.pause.get_or_insert_with(|| Arc::new(PauseGate::new())));
        let run_ctx = ctx.child();
        let handle_ctx = run_ctx.clone();

        let thread = thread::Builder::new()
            .name("dag-run".into())
            .spawn(move || run(&run_ctx, params))?;

        Ok(Self {
            gate,
            ctx: handle_ctx,
            thread,
        })
    }

    /// Stop workers at their next unit boundary.
    pub fn pause(&self) {
        self.gate.pause();
    }

    /// Let paused workers continue.
    pub fn resume(&self) {
        self.gate.resume();
    }

    /// Cancel the run. Units that have not started yet fail with
    /// [`ContextError::Cancelled`](crate::core::ContextError::Cancelled).
    ///
    /// A paused run stays paused until resumed.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// Returns `true` once the run has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run's outcome.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`EngineError::Panic`] if the run thread
    /// itself panicked.
    pub fn join(self) -> Result<(), EngineError> {
        self.thread.join().unwrap_or_else(|payload| {
            Err(EngineError::Panic {
                vertex: "<run>".into(),
                message: panic_message(payload.as_ref()),
            })
        })
    }

    /// Wait for the run's outcome without blocking the async runtime.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    #[cfg(feature = "tokio-runtime")]
    pub async fn join_async(self) -> Result<(), EngineError> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .unwrap_or_else(|err| {
                Err(EngineError::Panic {
                    vertex: "<run>".into(),
                    message: err.to_string(),
                })
            })
    }
}
