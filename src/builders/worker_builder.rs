//! Turn a graph of unit descriptors into a runnable worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::{EngineError, Node, Timeout, TransactionManager, Unit};
use crate::graph::Graph;
use crate::worker::{Step, Worker};

/// Build a [`Worker`] from `graph` without decoration.
///
/// # Errors
///
/// See [`WorkerBuilder::build`].
pub fn build_worker(graph: &Graph<Unit>) -> Result<Worker, EngineError> {
    WorkerBuilder::new(graph).build()
}

/// Resolves [`Unit`] descriptors into executable steps.
///
/// Virtual vertices become no-ops, transactional units are registered with a
/// fresh [`TransactionManager`], and plain units may be wrapped in a
/// [`Timeout`]. Unit priorities are copied onto vertices that have none of
/// their own, then the graph is optimized.
///
/// Units are shared, not cloned: two workers built from the same graph run
/// the same unit instances.
#[derive(Debug)]
pub struct WorkerBuilder<'g> {
    graph: &'g Graph<Unit>,
    timeouts: HashMap<String, Duration>,
    default_timeout: Option<Duration>,
}

impl<'g> WorkerBuilder<'g> {
    /// Start from `graph`.
    #[must_use]
    pub fn new(graph: &'g Graph<Unit>) -> Self {
        Self {
            graph,
            timeouts: HashMap::new(),
            default_timeout: None,
        }
    }

    /// Limit the vertex `name` to `budget`.
    #[must_use]
    pub fn with_timeout(mut self, name: impl Into<String>, budget: Duration) -> Self {
        self.timeouts.insert(name.into(), budget);
        self
    }

    /// Limit every plain unit without its own budget to `budget`.
    #[must_use]
    pub const fn with_default_timeout(mut self, budget: Duration) -> Self {
        self.default_timeout = Some(budget);
        self
    }

    /// Build the worker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if a timeout names an unknown
    /// vertex or a transactional one.
    pub fn build(self) -> Result<Worker, EngineError> {
        if let Some(name) = self.timeouts.keys().find(|name| self.graph.get(name).is_none()) {
            return Err(EngineError::Configuration(format!(
                "timeout set for unknown vertex {name}"
            )));
        }

        let transactions = Arc::new(TransactionManager::new());
        let mut steps = self.graph.map(|name, unit| -> Result<Step, EngineError> {
            let explicit = self.timeouts.get(name).copied();
            match unit {
                Unit::Virtual => Ok(None),
                Unit::Task(node) => {
                    let node = Arc::clone(node);
                    Ok(Some(match explicit.or(self.default_timeout) {
                        Some(budget) => Arc::new(Timeout::new(node, budget)) as Arc<dyn Node>,
                        None => node,
                    }))
                }
                Unit::Transactional(node) => {
                    if explicit.is_some() {
                        return Err(EngineError::Configuration(format!(
                            "timeout is not supported on transactional vertex {name}"
                        )));
                    }
                    Ok(Some(Arc::new(transactions.manage(Arc::clone(node))) as Arc<dyn Node>))
                }
            }
        })?;

        for vertex in self.graph.vertices() {
            let unit_priority = vertex.payload().priority();
            if vertex.priority() == 0 && unit_priority != 0 {
                steps.set_priority(vertex.name(), unit_priority);
            }
        }
        steps.optimize();

        debug!(
            vertices = steps.len(),
            schedule_num = steps.schedule_num(),
            "worker built"
        );
        Ok(Worker::new(steps, transactions))
    }
}
