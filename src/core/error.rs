//! Error types for graph validation and execution.

use std::time::Duration;

use thiserror::Error;

use crate::scheduler::Phase;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A unit could not be constructed or initialized before execution.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Leveling left these vertices unreachable.
    #[error("found cycle between vertices: {vertices:?}")]
    Cycle {
        /// Names of the vertices that were never leveled.
        vertices: Vec<String>,
    },
    /// A unit returned an error.
    #[error("{vertex} failed, error: {source}")]
    Execution {
        /// Vertex that failed.
        vertex: String,
        /// Error returned by the unit.
        #[source]
        source: anyhow::Error,
    },
    /// A unit panicked; the panic was contained.
    #[error("worker panic on {vertex}, info: {message}")]
    Panic {
        /// Vertex that panicked.
        vertex: String,
        /// Panic payload rendered as text.
        message: String,
    },
    /// An interrupt handler failed; the pass stopped at this vertex.
    #[error("interrupt at {vertex}:{phase} failed, error: {source}")]
    Interrupt {
        /// Vertex whose interrupt point fired.
        vertex: String,
        /// Phase the point fired at.
        phase: Phase,
        /// Error returned by the handler.
        #[source]
        source: anyhow::Error,
    },
    /// A unit exceeded its time budget.
    #[error("the running time exceeds the limit of {budget:?}")]
    Timeout {
        /// Budget that was exceeded.
        budget: Duration,
    },
    /// Fewer groups completed than were scheduled, without any other error.
    #[error(
        "some vertices cannot be run ({completed}/{expected} groups completed), check for a circular dependency"
    )]
    IncompleteSchedule {
        /// Groups that reported completion.
        completed: usize,
        /// Groups the run should have completed.
        expected: usize,
    },
    /// The run context was cancelled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl EngineError {
    /// Name of the vertex this error is attributed to, if any.
    #[must_use]
    pub fn vertex(&self) -> Option<&str> {
        match self {
            Self::Execution { vertex, .. }
            | Self::Panic { vertex, .. }
            | Self::Interrupt { vertex, .. } => Some(vertex),
            _ => None,
        }
    }

    /// Returns `true` if this error, or the unit error it wraps, is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Execution { source, .. } => source
                .downcast_ref::<Self>()
                .is_some_and(Self::is_timeout),
            _ => false,
        }
    }
}

/// Why a [`RunContext`](crate::core::RunContext) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Cancelled explicitly, or by the first failure of a run.
    #[error("context canceled")]
    Cancelled,
    /// The deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Result type returned by unit logic.
pub type AppResult<T> = Result<T, anyhow::Error>;
