//! Tests for the engine facade

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dagflow::builders::build_worker;
use dagflow::config::EngineConfig;
use dagflow::core::{EngineError, RunContext, Unit};
use dagflow::graph::Graph;
use dagflow::runtime::{Engine, RunReport};
use dagflow::state::{BaseState, SharedState};
use dagflow::worker::{Tracker, WorkParams};

fn state() -> SharedState {
    Arc::new(BaseState::new())
}

fn two_step_graph(fail: bool) -> Graph<Unit> {
    let mut graph = Graph::new();
    graph.add_vertex("prepare", Unit::func(|_, _| Ok(())));
    graph.add_vertex(
        "commit",
        Unit::func(move |_, _| {
            if fail {
                anyhow::bail!("rejected");
            }
            Ok(())
        }),
    );
    graph.add_edge("prepare", "commit");
    graph
}

#[test]
fn test_factory_error_surfaces_on_run() {
    let engine = Engine::new(EngineConfig::default(), || {
        Err(EngineError::Configuration("no graph".into()))
    })
    .unwrap();

    let err = engine.run(&RunContext::background(), &state()).unwrap_err();
    assert_eq!(err.to_string(), "configuration error: no graph");
}

#[test]
fn test_factory_error_surfaces_on_warmup() {
    let config = EngineConfig {
        warmup: 1,
        ..EngineConfig::default()
    };
    let result = Engine::new(config, || Err(EngineError::Configuration("broken".into())));
    assert!(result.is_err());
}

#[test]
fn test_failed_run_report() {
    let engine = Engine::from_graph(EngineConfig::default(), two_step_graph(true)).unwrap();
    assert!(engine.last_report().is_none());

    let err = engine.run(&RunContext::background(), &state()).unwrap_err();
    assert_eq!(err.vertex(), Some("commit"));

    let report = engine.last_report().unwrap();
    assert!(!report.ok);
    assert_eq!(report.failed_vertex.as_deref(), Some("commit"));
    assert_eq!(report.error.as_deref(), Some("commit failed, error: rejected"));

    let json = serde_json::to_string(&report).unwrap();
    let back: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn test_failed_run_returns_worker_to_pool() {
    let engine = Engine::from_graph(EngineConfig::default(), two_step_graph(true)).unwrap();
    for _ in 0..2 {
        assert!(engine.run(&RunContext::background(), &state()).is_err());
    }
    assert_eq!(engine.pooled(), 1);
}

#[test]
fn test_run_with_own_tracker() {
    let engine = Engine::from_graph(EngineConfig::default(), two_step_graph(false)).unwrap();
    let tracker = Arc::new(Tracker::new());

    engine
        .run_with(
            &RunContext::background(),
            &state(),
            WorkParams::default()
                .with_parallelism(2)
                .with_tracker(Arc::clone(&tracker)),
        )
        .unwrap();

    assert_eq!(tracker.len(), 8);
    assert!(Arc::ptr_eq(&engine.last_trace().unwrap(), &tracker));
}

#[test]
fn test_custom_factory_builds_on_demand() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let graph = Arc::new(two_step_graph(false));
    let engine = Engine::new(
        EngineConfig {
            warmup: 2,
            ..EngineConfig::default()
        },
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            build_worker(&graph)
        },
    )
    .unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 2);
    engine.run(&RunContext::background(), &state()).unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(engine.pooled(), 2);
    assert_eq!(engine.config().warmup, 2);
}
