//! Interrupt points fired by the scheduler between units.

use std::fmt;
use std::sync::Arc;

use crate::core::{AppResult, RunContext};
use crate::state::{BaseState, SharedState};

/// Moment in a vertex's lifecycle at which an interrupt can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the vertex is handed to a worker.
    Start,
    /// Before the vertex is marked done.
    End,
}

impl Phase {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

type Handler = Box<dyn FnMut(&Interruption<'_>) -> AppResult<()> + Send>;

/// A fired interrupt point, as seen by the handler.
#[derive(Clone, Copy)]
pub struct Interruption<'a> {
    /// Vertex the point matched.
    pub vertex: &'a str,
    /// Phase the point matched.
    pub phase: Phase,
    /// Context of the run being scheduled.
    pub ctx: &'a RunContext,
    /// State of the run being scheduled.
    pub state: &'a SharedState,
}

impl fmt::Debug for Interruption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interruption")
            .field("vertex", &self.vertex)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Ordered, lazily pulled sequence of interrupt points plus their handler.
///
/// Points are `"<vertex>:start"`, `"<vertex>:end"`, `"*:start"`, `"*:end"`,
/// or `"*"` (either phase of any vertex). Only one point is armed at a time;
/// when it matches, the handler runs on the scheduler thread and the next
/// point is pulled. A handler error stops the pass and fails the run.
pub struct Interrupts {
    points: Box<dyn Iterator<Item = String> + Send>,
    handler: Handler,
    armed: Option<String>,
    fired: usize,
    ctx: RunContext,
    state: SharedState,
}

impl Interrupts {
    /// Create an interrupt sequence.
    ///
    /// Until [`bind`](Self::bind) is called the handler sees a background
    /// context and an empty state; [`Worker::work`](crate::worker::Worker::work)
    /// binds the run's own.
    pub fn new<I, F>(points: I, handler: F) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
        F: FnMut(&Interruption<'_>) -> AppResult<()> + Send + 'static,
    {
        let mut points: Box<dyn Iterator<Item = String> + Send> = Box::new(points.into_iter());
        let armed = points.next();
        Self {
            points,
            handler: Box::new(handler),
            armed,
            fired: 0,
            ctx: RunContext::background(),
            state: Arc::new(BaseState::new()),
        }
    }

    /// Hand `ctx` and `state` to the handler from now on.
    pub fn bind(&mut self, ctx: RunContext, state: SharedState) {
        self.ctx = ctx;
        self.state = state;
    }

    /// Fire the armed point if it matches `vertex` at `phase`.
    ///
    /// Returns `Ok(true)` if the handler ran. The point counts as fired even
    /// when the handler fails.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub fn check(&mut self, vertex: &str, phase: Phase) -> AppResult<bool> {
        let Some(point) = self.armed.as_deref() else {
            return Ok(false);
        };
        if !matches(point, vertex, phase) {
            return Ok(false);
        }

        let outcome = (self.handler)(&Interruption {
            vertex,
            phase,
            ctx: &self.ctx,
            state: &self.state,
        });
        self.fired += 1;
        self.armed = self.points.next();
        outcome.map(|()| true)
    }

    /// Point waiting to fire, if any.
    #[must_use]
    pub fn armed(&self) -> Option<&str> {
        self.armed.as_deref()
    }

    /// Number of points fired so far.
    #[must_use]
    pub const fn fired(&self) -> usize {
        self.fired
    }
}

impl fmt::Debug for Interrupts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupts")
            .field("armed", &self.armed)
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

fn matches(point: &str, vertex: &str, phase: Phase) -> bool {
    if point == "*" {
        return true;
    }
    match point.rsplit_once(':') {
        Some((target, suffix)) => suffix == phase.suffix() && (target == "*" || target == vertex),
        None => false,
    }
}
