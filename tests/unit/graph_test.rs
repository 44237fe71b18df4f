//! Tests for graph construction, marshalling, and export

use std::sync::Arc;

use serde_json::json;

use dagflow::builders::build_worker;
use dagflow::core::{RunContext, Unit};
use dagflow::graph::{Graph, GraphData, Status};
use dagflow::state::{BaseState, SharedState, StateExt};
use dagflow::worker::WorkParams;

fn pipeline() -> Graph<String> {
    let mut graph = Graph::new();
    for (name, kind) in [("load", "io"), ("clean", "cpu"), ("index", "cpu"), ("store", "io")] {
        graph.add_vertex(name, kind.to_owned());
    }
    graph.add_edge("load", "clean");
    graph.add_edge("load", "index");
    graph.add_edge("clean", "store");
    graph.add_edge("index", "store");
    graph
}

#[test]
fn test_json_listing_shape() {
    let json: serde_json::Value = serde_json::from_str(&pipeline().to_json().unwrap()).unwrap();
    assert_eq!(json["Vertices"]["load"], json!("io"));
    assert_eq!(json["Edges"].as_array().unwrap().len(), 4);
    assert_eq!(json["Edges"][0], json!(["load", "clean"]));
}

#[test]
fn test_listing_rebuilds_runnable_graph() {
    let data: GraphData<String> = pipeline().to_data();

    let units = data.into_graph().map(|name, kind| -> Result<Unit, std::convert::Infallible> {
        let key = format!("{kind}:{name}");
        Ok(Unit::func(move |_, state| state.save(&key, &true, true)))
    })
    .unwrap();

    let state: SharedState = Arc::new(BaseState::new());
    build_worker(&units)
        .unwrap()
        .work(&RunContext::background(), &state, WorkParams::default())
        .unwrap();

    for key in ["io:load", "cpu:clean", "cpu:index", "io:store"] {
        assert_eq!(state.load::<bool>(key), Some(true), "{key}");
    }
}

#[test]
fn test_from_json_round_trip_keeps_structure() {
    let original = pipeline();
    let restored = Graph::<String>::from_json(&original.to_json().unwrap()).unwrap();

    assert_eq!(restored.len(), original.len());
    let mut edges: Vec<(String, String)> = restored
        .edges()
        .map(|(a, b)| (a.to_owned(), b.to_owned()))
        .collect();
    edges.sort();
    assert_eq!(
        edges,
        vec![
            ("clean".to_owned(), "store".to_owned()),
            ("index".to_owned(), "store".to_owned()),
            ("load".to_owned(), "clean".to_owned()),
            ("load".to_owned(), "index".to_owned()),
        ]
    );
}

#[test]
fn test_dot_export() {
    let mut graph = pipeline();
    graph.set_priority("clean", 3);
    let dot = graph.to_dot("etl");

    assert!(dot.starts_with("digraph etl {"));
    assert!(dot.contains("Priority: 3"));
    assert!(dot.contains("\"load\" -> \"clean\";"));
}

#[test]
fn test_status_after_run() {
    let mut graph = Graph::new();
    graph.add_vertex("a", Unit::Virtual);
    graph.add_vertex("b", Unit::Virtual);
    graph.add_edge("a", "b");

    let worker = build_worker(&graph).unwrap();
    let state: SharedState = Arc::new(BaseState::new());
    worker
        .work(&RunContext::background(), &state, WorkParams::default())
        .unwrap();

    assert_eq!(worker.graph().status_of("a"), Some(Status::Done));
    assert_eq!(worker.graph().status_of("b"), Some(Status::Done));
    assert_eq!(worker.graph().status_of("zzz"), None);
    assert_eq!(graph.status_of("a"), Some(Status::Todo));
}
