//! Readiness propagation over a graph.
//!
//! [`Scheduler`] is the step-by-step state machine: it holds the graph's run
//! lock, hands out groups whose dependencies are done, and learns about
//! finished groups through [`Scheduler::complete`]. [`Graph::scheduling`]
//! drives one on a coordinator thread behind a pair of channels.
//!
//! An interrupt handler error stops the pass: nothing else is handed out, and
//! the coordinator ends with [`EngineError::Interrupt`].

mod interrupt;

use std::borrow::Cow;
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::MutexGuard;
use tracing::debug;

use crate::core::EngineError;
use crate::worker::panic_message;
use crate::graph::{Graph, Group, Layout, RunTable, Status, VertexId};

pub use interrupt::{Interrupts, Interruption, Phase};

/// One scheduling pass over a graph.
///
/// Creating a scheduler takes the graph's run lock and resets every vertex
/// to [`Status::Todo`]; the lock is released when the scheduler is dropped.
/// Supplying interrupts schedules every vertex on its own.
pub struct Scheduler<'g, E> {
    graph: &'g Graph<E>,
    layout: Cow<'g, Layout>,
    run: MutexGuard<'g, RunTable>,
    interrupts: Option<Interrupts>,
    in_flight: usize,
    failure: Option<EngineError>,
}

impl<'g, E> Scheduler<'g, E> {
    /// Start a pass over `graph`. Blocks while another pass holds the graph.
    pub fn new(graph: &'g Graph<E>, interrupts: Option<Interrupts>) -> Self {
        let layout = graph.plan(interrupts.is_none());
        let mut run = graph.lock_run();

        for id in 0..graph.len() {
            run.status[id] = Status::Todo;
            run.wait[id] = graph.vertex(id).dependencies().len();
        }

        Self {
            graph,
            layout,
            run,
            interrupts,
            in_flight: 0,
            failure: None,
        }
    }

    /// Scheduling units this pass must complete.
    #[must_use]
    pub fn schedule_num(&self) -> usize {
        self.layout.schedule_num()
    }

    /// Groups handed out and not yet completed.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Returns `true` once nothing is in flight.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.in_flight == 0
    }

    /// Interrupt failure that stopped this pass, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&EngineError> {
        self.failure.as_ref()
    }

    /// Take the interrupt failure out of the pass.
    pub fn take_failure(&mut self) -> Option<EngineError> {
        self.failure.take()
    }

    /// Status of `id` in this pass.
    #[must_use]
    pub fn status(&self, id: VertexId) -> Status {
        self.run.status[id]
    }

    /// Groups of every head, highest priority first.
    pub fn seed(&mut self) -> Vec<Group> {
        let heads = self.layout.heads().to_vec();
        heads.into_iter().filter_map(|head| self.start(head)).collect()
    }

    /// Record that `group` finished and return the groups that became ready.
    ///
    /// Nothing becomes ready once an interrupt has failed.
    pub fn complete(&mut self, group: &[VertexId]) -> Vec<Group> {
        let graph = self.graph;
        let Some(&tail) = group.last() else {
            return Vec::new();
        };

        for &id in group {
            self.fire(id, Phase::End);
            self.run.status[id] = Status::Done;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.failure.is_some() {
            return Vec::new();
        }

        let mut ready = Vec::new();
        for &next in graph.vertex(tail).successors() {
            self.run.wait[next] = self.run.wait[next].saturating_sub(1);
            if self.run.wait[next] == 0 && self.run.status[next] == Status::Todo {
                ready.extend(self.start(next));
            }
        }

        debug!(
            vertex = graph.vertex(group[0]).name(),
            ready = ready.len(),
            in_flight = self.in_flight,
            "group completed"
        );
        ready
    }

    fn start(&mut self, head: VertexId) -> Option<Group> {
        if self.failure.is_some() {
            return None;
        }
        let group = self
            .layout
            .group(head)
            .cloned()
            .unwrap_or_else(|| Arc::from([head]));

        for &id in group.iter() {
            if !self.fire(id, Phase::Start) {
                return None;
            }
            self.run.status[id] = Status::Doing;
        }
        self.in_flight += 1;
        Some(group)
    }

    /// Check the interrupt point for `id`; `false` once the pass has failed.
    fn fire(&mut self, id: VertexId, phase: Phase) -> bool {
        if self.failure.is_some() {
            return false;
        }
        let Some(interrupts) = self.interrupts.as_mut() else {
            return true;
        };
        let graph = self.graph;
        let vertex = graph.vertex(id).name();
        if let Err(source) = interrupts.check(vertex, phase) {
            debug!(vertex, %phase, error = %source, "interrupt failed");
            self.failure = Some(EngineError::Interrupt {
                vertex: vertex.to_owned(),
                phase,
                source,
            });
        }
        self.failure.is_none()
    }
}

impl<E> std::fmt::Debug for Scheduler<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("schedule_num", &self.layout.schedule_num())
            .field("in_flight", &self.in_flight)
            .field("interrupts", &self.interrupts)
            .field("failed", &self.failure.is_some())
            .finish_non_exhaustive()
    }
}

/// Channels of a running scheduling pass plus its coordinator.
#[derive(Debug)]
pub struct Pass<'scope> {
    /// Ready groups. Closes once the pass is over.
    pub todo: Receiver<Group>,
    /// Finished groups go back here.
    pub done: Sender<Group>,
    coordinator: ScopedJoinHandle<'scope, Result<(), EngineError>>,
}

impl Pass<'_> {
    /// Drop this side's channels and wait for the coordinator.
    ///
    /// # Errors
    ///
    /// Returns the interrupt failure that stopped the pass, or
    /// [`EngineError::Panic`] if the coordinator itself panicked.
    pub fn join(self) -> Result<(), EngineError> {
        let Self {
            todo,
            done,
            coordinator,
        } = self;
        drop(todo);
        drop(done);
        coordinator.join().unwrap_or_else(|payload| {
            Err(EngineError::Panic {
                vertex: "<scheduler>".into(),
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

impl<E: Sync> Graph<E> {
    /// Run a scheduling pass on a coordinator thread inside `scope`.
    ///
    /// The returned [`Pass`] carries the `todo` receiver (ready groups) and
    /// the `done` sender (finished groups). `todo` closes once every
    /// handed-out group has come back and nothing else is ready, or as soon
    /// as an interrupt fails. Dropping every receiver or every sender on the
    /// worker side also ends the pass and releases the graph.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the coordinator thread cannot start.
    pub fn scheduling<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        interrupts: Option<Interrupts>,
        parallelism: usize,
    ) -> Result<Pass<'scope>, EngineError> {
        let schedule_num = if interrupts.is_some() {
            self.len()
        } else {
            self.schedule_num()
        };
        let (todo_tx, todo_rx) = bounded::<Group>((1 + schedule_num / 2).min(parallelism.max(1)));
        let (done_tx, done_rx) = bounded::<Group>(schedule_num.max(1));

        let coordinator = thread::Builder::new()
            .name("dag-scheduler".into())
            .spawn_scoped(scope, move || coordinate(self, interrupts, &todo_tx, &done_rx))?;

        Ok(Pass {
            todo: todo_rx,
            done: done_tx,
            coordinator,
        })
    }
}

fn coordinate<E>(
    graph: &Graph<E>,
    interrupts: Option<Interrupts>,
    todo: &Sender<Group>,
    done: &Receiver<Group>,
) -> Result<(), EngineError> {
    let mut scheduler = Scheduler::new(graph, interrupts);
    debug!(schedule_num = scheduler.schedule_num(), "scheduling started");

    for group in scheduler.seed() {
        if todo.send(group).is_err() {
            debug!("workers gone while seeding");
            return Ok(());
        }
    }

    while !scheduler.is_finished() {
        if let Some(err) = scheduler.take_failure() {
            return Err(err);
        }
        let Ok(group) = done.recv() else {
            debug!(in_flight = scheduler.in_flight(), "workers gone, stopping");
            return Ok(());
        };
        for ready in scheduler.complete(&group) {
            if todo.send(ready).is_err() {
                return Ok(());
            }
        }
    }
    if let Some(err) = scheduler.take_failure() {
        return Err(err);
    }
    debug!("scheduling finished");
    Ok(())
}
