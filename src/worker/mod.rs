//! Concurrent execution of an optimized graph.
//!
//! A [`Worker`] owns a graph whose payloads are ready-to-run units and the
//! transaction manager those units were registered with. Each call to
//! [`Worker::work`] is one run: groups flow from the scheduler's coordinator
//! thread to a bounded set of named worker threads and back, and the run ends
//! with exactly one commit or rollback.

mod handle;
mod pause;
mod pool;
mod tracker;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{EngineError, Node, RunContext, TransactionManager};
use crate::graph::{Graph, Group, VertexId};
use crate::scheduler::{Interrupts, Scheduler};
use crate::state::SharedState;

pub use handle::RunHandle;
pub use pause::PauseGate;
pub use pool::WorkerPool;
pub use tracker::{TraceEvent, TraceKind, Tracker};

/// Executable payload of a vertex; `None` marks a structural vertex.
pub type Step = Option<Arc<dyn Node>>;

/// Options for one run.
#[derive(Debug, Default)]
pub struct WorkParams {
    /// Worker thread limit; `0` uses the number of available CPUs.
    pub parallelism: usize,
    /// Receives ready/start/end/complete events for every vertex.
    pub tracker: Option<Arc<Tracker>>,
    /// Interrupt points fired by the scheduler.
    pub interrupts: Option<Interrupts>,
    /// Gate checked before every unit.
    pub pause: Option<Arc<PauseGate>>,
}

impl WorkParams {
    /// Set the worker thread limit.
    #[must_use]
    pub const fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Record events into `tracker`.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<Tracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Fire `interrupts` during scheduling.
    #[must_use]
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Check `gate` before every unit.
    #[must_use]
    pub fn with_pause(mut self, gate: Arc<PauseGate>) -> Self {
        self.pause = Some(gate);
        self
    }
}

/// A built graph ready to be run, possibly many times.
///
/// Runs of one worker are serialized.
pub struct Worker {
    graph: Graph<Step>,
    transactions: Arc<TransactionManager>,
    serial: Mutex<()>,
}

impl Worker {
    /// Wrap `graph`, optimizing it if needed.
    #[must_use]
    pub fn new(mut graph: Graph<Step>, transactions: Arc<TransactionManager>) -> Self {
        if graph.layout().is_none() {
            graph.optimize();
        }
        Self {
            graph,
            transactions,
            serial: Mutex::new(()),
        }
    }

    /// The executable graph.
    #[must_use]
    pub const fn graph(&self) -> &Graph<Step> {
        &self.graph
    }

    /// Manager of this worker's transactional units.
    #[must_use]
    pub const fn transactions(&self) -> &Arc<TransactionManager> {
        &self.transactions
    }

    /// Run the graph once.
    ///
    /// # Errors
    ///
    /// Returns the first unit failure, panic, or cancellation, or
    /// [`EngineError::IncompleteSchedule`] if some groups never became ready.
    pub fn work(
        &self,
        ctx: &RunContext,
        state: &SharedState,
        params: WorkParams,
    ) -> Result<(), EngineError> {
        let _serial = self.serial.lock();
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        let WorkParams {
            parallelism,
            tracker,
            interrupts,
            pause,
        } = params;

        let interrupted = interrupts.is_some();
        let expected = if interrupted {
            self.graph.len()
        } else {
            self.graph.schedule_num()
        };
        let limit = if parallelism > 0 {
            parallelism
        } else {
            num_cpus::get()
        };
        let threads = limit.min(expected).max(1);

        info!(
            %run_id,
            vertices = self.graph.len(),
            schedule_num = expected,
            threads,
            "run started"
        );

        let run = Run {
            graph: &self.graph,
            ctx: ctx.child(),
            state,
            tracker: tracker.as_deref(),
            pause: pause.as_deref(),
            completed: AtomicUsize::new(0),
            failure: Mutex::new(None),
            abort: Mutex::new(None),
        };

        if expected == 1 && !interrupted {
            run.inline();
        } else {
            let interrupts = interrupts.map(|mut interrupts| {
                interrupts.bind(run.ctx.clone(), Arc::clone(state));
                interrupts
            });
            run.parallel(interrupts, threads);
        }

        let completed = run.completed.load(Ordering::Acquire);
        let failure = run.failure.lock().take();
        let result = match failure {
            Some(err) => Err(err),
            None if completed < expected => {
                warn!(%run_id, completed, expected, "schedule did not complete");
                Err(EngineError::IncompleteSchedule {
                    completed,
                    expected,
                })
            }
            None => Ok(()),
        };

        match &result {
            Ok(()) => self.transactions.commit_all(),
            Err(_) => self.transactions.rollback_all(),
        }

        info!(
            %run_id,
            completed,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis(),
            "run finished"
        );
        result
    }

    /// Run the graph on a background thread.
    ///
    /// A pause gate is created when `params` carries none, so the returned
    /// handle can always pause and resume the run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the thread cannot start.
    pub fn spawn(
        self: Arc<Self>,
        ctx: &RunContext,
        state: SharedState,
        params: WorkParams,
    ) -> Result<RunHandle, EngineError> {
        RunHandle::spawn(ctx, params, move |ctx, params| self.work(ctx, &state, params))
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("vertices", &self.graph.len())
            .field("transactions", &self.transactions)
            .finish_non_exhaustive()
    }
}

/// Shared state of one run.
struct Run<'a> {
    graph: &'a Graph<Step>,
    ctx: RunContext,
    state: &'a SharedState,
    tracker: Option<&'a Tracker>,
    pause: Option<&'a PauseGate>,
    completed: AtomicUsize,
    failure: Mutex<Option<EngineError>>,
    abort: Mutex<Option<Sender<()>>>,
}

impl Run<'_> {
    /// Single chain: schedule and execute on the calling thread.
    fn inline(&self) {
        debug!("running inline");
        let mut scheduler = Scheduler::new(self.graph, None);
        let mut pending = scheduler.seed();
        while let Some(group) = pending.pop() {
            if let Err(err) = self.execute(&group) {
                self.fail(err);
                return;
            }
            pending.extend(scheduler.complete(&group));
        }
    }

    fn parallel(&self, interrupts: Option<Interrupts>, threads: usize) {
        thread::scope(|scope| {
            let pass = match self.graph.scheduling(scope, interrupts, threads) {
                Ok(pass) => pass,
                Err(err) => {
                    self.fail(err);
                    return;
                }
            };

            let (abort_tx, abort_rx) = bounded::<()>(0);
            *self.abort.lock() = Some(abort_tx);

            for worker_id in 0..threads {
                let todo = pass.todo.clone();
                let done = pass.done.clone();
                let abort = abort_rx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("dag-worker-{worker_id}"))
                    .spawn_scoped(scope, move || self.drain(worker_id, &todo, &done, &abort));
                if let Err(err) = spawned {
                    self.fail(err.into());
                    break;
                }
            }

            if let Err(err) = pass.join() {
                self.fail(err);
            }
        });
    }

    fn drain(
        &self,
        worker_id: usize,
        todo: &Receiver<Group>,
        done: &Sender<Group>,
        abort: &Receiver<()>,
    ) {
        debug!(worker_id, "worker started");
        loop {
            let group = select! {
                recv(todo) -> msg => match msg {
                    Ok(group) => group,
                    Err(_) => break,
                },
                recv(abort) -> _ => break,
            };

            if let Err(err) = self.execute(&group) {
                self.fail(err);
                break;
            }
            if done.send(group).is_err() {
                break;
            }
        }
        debug!(worker_id, "worker exiting");
    }

    /// Run the members of `group` in order.
    fn execute(&self, group: &[VertexId]) -> Result<(), EngineError> {
        for &id in group {
            let vertex = self.graph.vertex(id);
            let name = vertex.name();

            if let Some(gate) = self.pause {
                gate.wait();
            }
            if let Some(err) = self.ctx.err() {
                return Err(err.into());
            }

            self.trace(name, TraceKind::Ready);
            self.trace(name, TraceKind::Start);
            if let Some(node) = vertex.payload() {
                match panic::catch_unwind(AssertUnwindSafe(|| node.run(&self.ctx, self.state))) {
                    Ok(Ok(())) => {}
                    Ok(Err(source)) => return Err(attribute(name, source)),
                    Err(payload) => {
                        return Err(EngineError::Panic {
                            vertex: name.to_owned(),
                            message: panic_message(payload.as_ref()),
                        });
                    }
                }
            }
            self.trace(name, TraceKind::End);
            self.trace(name, TraceKind::Complete);
        }

        self.completed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Keep the first error, then stop every other worker.
    fn fail(&self, err: EngineError) {
        {
            let mut slot = self.failure.lock();
            if slot.is_none() {
                warn!(vertex = err.vertex().unwrap_or("-"), error = %err, "run failed");
                *slot = Some(err);
            } else {
                debug!(error = %err, "suppressed error after first failure");
            }
        }
        drop(self.abort.lock().take());
        self.ctx.cancel();
    }

    fn trace(&self, vertex: &str, kind: TraceKind) {
        if let Some(tracker) = self.tracker {
            tracker.record(vertex, kind);
        }
    }
}

/// Tag a unit error with the vertex it came from.
///
/// A panic a decorator already caught keeps its message and takes the
/// vertex name; anything else becomes [`EngineError::Execution`].
fn attribute(vertex: &str, source: anyhow::Error) -> EngineError {
    if let Some(EngineError::Panic { message, .. }) = source.downcast_ref::<EngineError>() {
        return EngineError::Panic {
            vertex: vertex.to_owned(),
            message: message.clone(),
        };
    }
    EngineError::Execution {
        vertex: vertex.to_owned(),
        source,
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
