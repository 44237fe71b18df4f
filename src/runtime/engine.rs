//! Engine facade: pooled workers behind a single `run` call.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::RunReport;
use crate::builders::build_worker;
use crate::config::EngineConfig;
use crate::core::{EngineError, RunContext, Unit};
use crate::graph::Graph;
use crate::state::SharedState;
use crate::worker::{RunHandle, Tracker, WorkParams, Worker, WorkerPool};

/// Vertex costs listed in a slow-run warning.
const SLOW_RUN_COSTS: usize = 3;

/// Builds a fresh worker for the engine's graph.
pub type WorkerFactory = Arc<dyn Fn() -> Result<Worker, EngineError> + Send + Sync>;

/// Runs one logical graph repeatedly, reusing built workers.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use dagflow::config::EngineConfig;
/// use dagflow::core::{RunContext, Unit};
/// use dagflow::graph::Graph;
/// use dagflow::runtime::Engine;
/// use dagflow::state::{BaseState, SharedState, StateExt};
///
/// let mut graph = Graph::new();
/// graph.add_vertex("fetch", Unit::func(|_, state| state.save("body", &"ok", true)));
/// graph.add_vertex("parse", Unit::func(|_, _| Ok(())));
/// graph.add_edge("fetch", "parse");
///
/// let engine = Engine::from_graph(EngineConfig::default(), graph).unwrap();
/// let state: SharedState = Arc::new(BaseState::new());
/// engine.run(&RunContext::background(), &state).unwrap();
/// assert_eq!(state.load::<String>("body").as_deref(), Some("ok"));
/// ```
pub struct Engine {
    config: EngineConfig,
    factory: WorkerFactory,
    pool: RwLock<Arc<WorkerPool>>,
    last_trace: Arc<Mutex<Option<Arc<Tracker>>>>,
    last_report: Arc<Mutex<Option<RunReport>>>,
}

impl Engine {
    /// Create an engine that builds workers with `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if `config` is invalid, or the
    /// factory's error if warmup fails.
    pub fn new<F>(config: EngineConfig, factory: F) -> Result<Self, EngineError>
    where
        F: Fn() -> Result<Worker, EngineError> + Send + Sync + 'static,
    {
        config.validate().map_err(EngineError::Configuration)?;

        let engine = Self {
            pool: RwLock::new(Arc::new(WorkerPool::new(config.pool_cache_size))),
            factory: Arc::new(factory),
            last_trace: Arc::new(Mutex::new(None)),
            last_report: Arc::new(Mutex::new(None)),
            config,
        };
        if !engine.config.disable_pool {
            engine.warm(engine.config.warmup)?;
        }

        info!(
            pool_cache_size = engine.config.pool_cache_size,
            warmup = engine.config.warmup,
            disable_pool = engine.config.disable_pool,
            "engine initialized"
        );
        Ok(engine)
    }

    /// Create an engine over a graph of unit descriptors.
    ///
    /// The graph is checked for cycles once, here. Every worker shares the
    /// graph's unit instances.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cycle`] for a cyclic graph, otherwise as
    /// [`Engine::new`].
    pub fn from_graph(config: EngineConfig, graph: Graph<Unit>) -> Result<Self, EngineError> {
        graph.check()?;
        let graph = Arc::new(graph);
        Self::new(config, move || build_worker(&graph))
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the graph once with default parameters.
    ///
    /// # Errors
    ///
    /// Returns the worker's error, or the factory's if no worker is cached.
    pub fn run(&self, ctx: &RunContext, state: &SharedState) -> Result<(), EngineError> {
        self.run_with(ctx, state, WorkParams::default())
    }

    /// Run the graph once.
    ///
    /// A zero `parallelism` in `params` falls back to the configured value.
    /// With tracking enabled a tracker is attached unless `params` has one.
    ///
    /// # Errors
    ///
    /// Returns the worker's error, or the factory's if no worker is cached.
    pub fn run_with(
        &self,
        ctx: &RunContext,
        state: &SharedState,
        params: WorkParams,
    ) -> Result<(), EngineError> {
        let worker = self.acquire()?;
        let pool = (!self.config.disable_pool).then(|| Arc::clone(&self.pool.read()));
        let params = self.prepare(params);
        self.job().execute(&worker, ctx, state, params, pool.as_deref())
    }

    /// Run the graph on a background thread.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if no worker is cached, or
    /// [`EngineError::Spawn`] if the thread cannot start.
    pub fn run_async(
        &self,
        ctx: &RunContext,
        state: SharedState,
        params: WorkParams,
    ) -> Result<RunHandle, EngineError> {
        let worker = self.acquire()?;
        let pool = (!self.config.disable_pool).then(|| Arc::clone(&self.pool.read()));
        let params = self.prepare(params);
        let job = self.job();

        RunHandle::spawn(ctx, params, move |ctx, params| {
            job.execute(&worker, ctx, &state, params, pool.as_deref())
        })
    }

    /// Replace the pool with one of capacity `size` and pre-build `warmup`
    /// workers into it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if `warmup` exceeds `size`, or
    /// the factory's error.
    pub fn set_pool_cache(&self, size: usize, warmup: usize) -> Result<(), EngineError> {
        if warmup > size {
            return Err(EngineError::Configuration(format!(
                "warmup ({warmup}) must not exceed pool size ({size})"
            )));
        }
        *self.pool.write() = Arc::new(WorkerPool::new(size));
        info!(size, warmup, "worker pool rebuilt");
        self.warm(warmup)
    }

    /// Drop every cached worker.
    pub fn reset_pool(&self) {
        self.pool.read().reset();
        debug!("worker pool reset");
    }

    /// Number of cached workers.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.pool.read().len()
    }

    /// Trace of the most recent tracked run.
    #[must_use]
    pub fn last_trace(&self) -> Option<Arc<Tracker>> {
        self.last_trace.lock().clone()
    }

    /// Outcome of the most recent run.
    #[must_use]
    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report.lock().clone()
    }

    fn warm(&self, count: usize) -> Result<(), EngineError> {
        let pool = Arc::clone(&self.pool.read());
        for _ in 0..count {
            pool.put(Arc::new((self.factory)()?));
        }
        Ok(())
    }

    fn acquire(&self) -> Result<Arc<Worker>, EngineError> {
        if !self.config.disable_pool {
            if let Some(worker) = self.pool.read().get() {
                return Ok(worker);
            }
        }
        debug!("building worker");
        Ok(Arc::new((self.factory)()?))
    }

    /// Fill in what the caller left to the engine's config.
    fn prepare(&self, mut params: WorkParams) -> WorkParams {
        if params.parallelism == 0 {
            params.parallelism = self.config.parallelism;
        }
        if self.config.enable_tracking && params.tracker.is_none() {
            params.tracker = Some(Arc::new(Tracker::new()));
        }
        params
    }

    fn job(&self) -> Job {
        Job {
            slow_threshold: self.config.slow_threshold(),
            last_trace: Arc::clone(&self.last_trace),
            last_report: Arc::clone(&self.last_report),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("pool", &*self.pool.read())
            .finish_non_exhaustive()
    }
}

/// One run, detached from the engine so it can move to another thread.
struct Job {
    slow_threshold: Option<std::time::Duration>,
    last_trace: Arc<Mutex<Option<Arc<Tracker>>>>,
    last_report: Arc<Mutex<Option<RunReport>>>,
}

impl Job {
    fn execute(
        self,
        worker: &Arc<Worker>,
        ctx: &RunContext,
        state: &SharedState,
        params: WorkParams,
        pool: Option<&WorkerPool>,
    ) -> Result<(), EngineError> {
        let run_id = Uuid::new_v4().to_string();
        let tracker = params.tracker.clone();
        let started = Instant::now();

        let outcome = worker.work(ctx, state, params);

        let elapsed = started.elapsed();
        let slow = self.slow_threshold.is_some_and(|limit| elapsed > limit);

        if let Some(pool) = pool {
            pool.put(Arc::clone(worker));
        }

        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let report = RunReport::new(run_id, &outcome, elapsed_ms, slow, tracker.as_deref());
        if slow {
            warn!(
                run_id = %report.run_id,
                elapsed_ms,
                slowest = %report.slowest(SLOW_RUN_COSTS),
                "slow run"
            );
        }
        *self.last_report.lock() = Some(report);
        if tracker.is_some() {
            *self.last_trace.lock() = tracker;
        }
        outcome
    }
}
