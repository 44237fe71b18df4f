//! # dagflow
//!
//! An embeddable task-graph execution engine.
//!
//! Named units of work are connected by dependency edges into a [`graph::Graph`].
//! The engine schedules them concurrently while preserving dependency order,
//! fires interrupt points between units, finalizes transactional units with
//! one commit or rollback per run, and reuses built graphs across runs.
//!
//! ## Key Features
//!
//! - **Chain collapsing**: serial runs of vertices are scheduled as one group
//!   and executed back to back by a single worker thread
//! - **Bounded parallelism**: named OS worker threads fed through bounded
//!   crossbeam channels by a single coordinator thread
//! - **Failure containment**: unit errors and panics are attributed to their
//!   vertex; the first one cancels the rest of the run
//! - **Transactions**: commit in registration order, roll back in reverse
//! - **Interrupts and pausing**: observe, abort, or hold a run between units
//! - **Worker pool**: two-tier cache of built workers
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use dagflow::config::EngineConfig;
//! use dagflow::core::{RunContext, Unit};
//! use dagflow::graph::Graph;
//! use dagflow::runtime::Engine;
//! use dagflow::state::{BaseState, SharedState, StateExt};
//!
//! let mut graph = Graph::new();
//! graph.add_vertex("start", Unit::Virtual);
//! graph.add_vertex("a", Unit::func(|_, state| state.update_as::<u32, _>("hits", |n| n + 1)));
//! graph.add_vertex("b", Unit::func(|_, state| state.update_as::<u32, _>("hits", |n| n + 1)));
//! graph.add_vertex("end", Unit::Virtual);
//! graph.add_edge("start", "a");
//! graph.add_edge("start", "b");
//! graph.add_edge("a", "end");
//! graph.add_edge("b", "end");
//!
//! let engine = Engine::from_graph(EngineConfig::default(), graph).unwrap();
//! let state: SharedState = Arc::new(BaseState::new());
//! engine.run(&RunContext::background(), &state).unwrap();
//! assert_eq!(state.load::<u32>("hits"), Some(2));
//! ```
//!
//! For lower-level control build a [`worker::Worker`] with
//! [`builders::build_worker`] and call [`worker::Worker::work`] directly.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Run context, unit traits, errors, transactions, and decorators.
pub mod core;
/// Dependency graph, optimizer, and marshalling.
pub mod graph;
/// Readiness propagation and interrupt points.
pub mod scheduler;
/// Concurrent execution, tracing, pausing, and worker pooling.
pub mod worker;
/// Run-scoped state variants.
pub mod state;
/// Engine configuration.
pub mod config;
/// Builders that turn graph descriptions into runnable workers.
pub mod builders;
/// Engine facade.
pub mod runtime;
/// Shared utilities.
pub mod util;
