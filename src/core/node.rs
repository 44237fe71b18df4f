//! Unit-of-work traits and the closed set of unit kinds.

use std::fmt;
use std::sync::Arc;

use super::{AppResult, RunContext};
use crate::state::SharedState;

/// A unit of work scheduled as one graph vertex.
///
/// The unit is shared between worker threads, so `run` takes `&self`; units
/// that carry mutable data use interior mutability.
///
/// # Example
///
/// ```rust,ignore
/// use dagflow::core::{AppResult, Node, RunContext};
/// use dagflow::state::{SharedState, StateExt};
///
/// struct Fetch;
///
/// impl Node for Fetch {
///     fn run(&self, ctx: &RunContext, state: &SharedState) -> AppResult<()> {
///         if ctx.is_done() {
///             return Ok(());
///         }
///         state.save("body", &"<html/>", true)
///     }
/// }
/// ```
pub trait Node: Send + Sync {
    /// Execute the unit.
    ///
    /// # Errors
    ///
    /// Any error fails the run; the engine wraps it with the vertex name.
    fn run(&self, ctx: &RunContext, state: &SharedState) -> AppResult<()>;

    /// Scheduling priority among siblings; higher runs first.
    fn priority(&self) -> i32 {
        0
    }
}

/// A unit whose effects are finalized once per run.
///
/// `commit` fires after a successful run, `rollback` after a failed one;
/// neither depends on this unit's own outcome.
pub trait Transactional: Node {
    /// Make the unit's effects permanent.
    fn commit(&self);

    /// Undo the unit's effects.
    fn rollback(&self);
}

/// Unit descriptor as handed to the worker builder.
///
/// Capabilities are fixed here, at construction, instead of being checked
/// while the graph runs.
#[derive(Clone)]
pub enum Unit {
    /// Structural vertex with no work (start/end markers, join points).
    Virtual,
    /// Plain unit.
    Task(Arc<dyn Node>),
    /// Unit that participates in the run's transaction.
    Transactional(Arc<dyn Transactional>),
}

impl Unit {
    /// Wrap a plain unit.
    pub fn task<N: Node + 'static>(node: N) -> Self {
        Self::Task(Arc::new(node))
    }

    /// Wrap a transactional unit.
    pub fn transactional<T: Transactional + 'static>(node: T) -> Self {
        Self::Transactional(Arc::new(node))
    }

    /// Wrap a closure as a plain unit.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&RunContext, &SharedState) -> AppResult<()> + Send + Sync + 'static,
    {
        Self::Task(Arc::new(FuncNode::new(f)))
    }

    /// Priority exposed by the wrapped unit, `0` for virtual vertices.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::Virtual => 0,
            Self::Task(node) => node.priority(),
            Self::Transactional(node) => node.priority(),
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtual => f.write_str("Virtual"),
            Self::Task(_) => f.write_str("Task"),
            Self::Transactional(_) => f.write_str("Transactional"),
        }
    }
}

type RunFn = Box<dyn Fn(&RunContext, &SharedState) -> AppResult<()> + Send + Sync>;

/// Adapts a closure into a [`Node`].
pub struct FuncNode {
    run_fn: RunFn,
    priority: i32,
}

impl FuncNode {
    /// Wrap `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RunContext, &SharedState) -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            run_fn: Box::new(f),
            priority: 0,
        }
    }

    /// Set the priority reported to the optimizer.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Node for FuncNode {
    fn run(&self, ctx: &RunContext, state: &SharedState) -> AppResult<()> {
        (self.run_fn)(ctx, state)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Debug for FuncNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncNode")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
