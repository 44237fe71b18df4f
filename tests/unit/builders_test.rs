//! Tests for worker builders

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dagflow::builders::{build_worker, WorkerBuilder};
use dagflow::core::{AppResult, EngineError, FuncNode, Node, RunContext, Transactional, Unit};
use dagflow::graph::Graph;
use dagflow::state::{BaseState, SharedState, StateExt};
use dagflow::worker::WorkParams;

struct Noop;

impl Node for Noop {
    fn run(&self, _ctx: &RunContext, _state: &SharedState) -> AppResult<()> {
        Ok(())
    }
}

impl Transactional for Noop {
    fn commit(&self) {}

    fn rollback(&self) {}
}

fn state() -> SharedState {
    Arc::new(BaseState::new())
}

#[test]
fn test_virtual_vertices_have_no_step() {
    let mut graph = Graph::new();
    graph.add_vertex("start", Unit::Virtual);
    graph.add_vertex("work", Unit::func(|_, _| Ok(())));
    graph.add_edge("start", "work");

    let worker = build_worker(&graph).unwrap();
    assert!(worker.graph().get("start").unwrap().payload().is_none());
    assert!(worker.graph().get("work").unwrap().payload().is_some());
    assert!(worker.graph().layout().is_some());
}

#[test]
fn test_workers_share_unit_instances() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut graph = Graph::new();
    graph.add_vertex("count", {
        let calls = Arc::clone(&calls);
        Unit::func(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });

    let first = build_worker(&graph).unwrap();
    let second = build_worker(&graph).unwrap();
    first
        .work(&RunContext::background(), &state(), WorkParams::default())
        .unwrap();
    second
        .work(&RunContext::background(), &state(), WorkParams::default())
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_vertex_priority_wins_over_unit_priority() {
    let mut graph = Graph::new();
    graph.add_vertex("root", Unit::Virtual);
    graph.add_vertex("a", Unit::task(FuncNode::new(|_, _| Ok(())).with_priority(5)));
    graph.add_vertex("b", Unit::task(FuncNode::new(|_, _| Ok(())).with_priority(1)));
    graph.add_edge("root", "a");
    graph.add_edge("root", "b");
    graph.set_priority("b", 10);

    let worker = build_worker(&graph).unwrap();
    let root = worker.graph().get("root").unwrap();
    assert_eq!(worker.graph().names(root.successors()), vec!["b", "a"]);
    assert_eq!(worker.graph().get("a").unwrap().priority(), 5);
}

#[test]
fn test_timeout_on_transactional_vertex_is_rejected() {
    let mut graph = Graph::new();
    graph.add_vertex("tx", Unit::transactional(Noop));

    let err = WorkerBuilder::new(&graph)
        .with_timeout("tx", Duration::from_secs(1))
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(ref msg) if msg.contains("tx")));
}

#[test]
fn test_default_timeout_skips_transactional_vertices() {
    let mut graph = Graph::new();
    graph.add_vertex("tx", Unit::transactional(Noop));
    graph.add_vertex("plain", Unit::func(|_, _| Ok(())));

    let worker = WorkerBuilder::new(&graph)
        .with_default_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    worker
        .work(&RunContext::background(), &state(), WorkParams::default())
        .unwrap();
    assert_eq!(worker.transactions().pending(), 0);
}

#[test]
fn test_late_writes_after_timeout_are_dropped() {
    let mut graph = Graph::new();
    graph.add_vertex(
        "late",
        Unit::func(|_, state| {
            thread::sleep(Duration::from_millis(60));
            state.save("late", &true, true)
        }),
    );

    let worker = WorkerBuilder::new(&graph)
        .with_timeout("late", Duration::from_millis(10))
        .build()
        .unwrap();
    let state = state();
    let err = worker
        .work(&RunContext::background(), &state, WorkParams::default())
        .unwrap_err();
    assert!(err.is_timeout());

    thread::sleep(Duration::from_millis(120));
    assert_eq!(state.load::<bool>("late"), None);
}

#[test]
fn test_panic_under_timeout_keeps_message_and_vertex() {
    let mut graph = Graph::new();
    graph.add_vertex(
        "flaky",
        Unit::func(|_, state| {
            if state.get("armed").is_some() {
                panic!("cache poisoned");
            }
            Ok(())
        }),
    );

    let worker = WorkerBuilder::new(&graph)
        .with_timeout("flaky", Duration::from_secs(1))
        .build()
        .unwrap();
    let state = state();
    state.save("armed", &true, true).unwrap();
    let err = worker
        .work(&RunContext::background(), &state, WorkParams::default())
        .unwrap_err();

    assert_eq!(err.vertex(), Some("flaky"));
    match err {
        EngineError::Panic { vertex, message } => {
            assert_eq!(vertex, "flaky");
            assert_eq!(message, "cache poisoned");
        }
        other => panic!("unexpected {other:?}"),
    }
}
