//! Tests for state variants used inside runs

use std::sync::Arc;

use serde_json::json;

use dagflow::builders::build_worker;
use dagflow::core::{RunContext, Unit};
use dagflow::graph::Graph;
use dagflow::state::{Access, BaseState, GuardState, OverlayState, SharedState, State, StateExt};
use dagflow::worker::WorkParams;

#[test]
fn test_overlay_branches_are_isolated() {
    let base = Arc::new(BaseState::new());
    base.set("winner", json!(null));
    let lower: SharedState = base.clone();

    let left = Arc::new(OverlayState::new(Arc::clone(&lower)));
    let right = Arc::new(OverlayState::new(Arc::clone(&lower)));
    left.save("winner", &"left", true).unwrap();
    right.save("winner", &"right", true).unwrap();

    assert_eq!(left.load::<String>("winner").as_deref(), Some("left"));
    assert_eq!(right.load::<String>("winner").as_deref(), Some("right"));
    assert_eq!(base.get("winner"), Some(json!(null)));

    right.sync();
    assert_eq!(base.load::<String>("winner").as_deref(), Some("right"));
    assert_eq!(left.pending(), 1);
    assert_eq!(right.pending(), 0);
}

#[test]
fn test_run_against_overlay_then_sync() {
    let mut graph = Graph::new();
    graph.add_vertex("count", Unit::func(|_, state| state.update_as::<u32, _>("n", |n| n + 1)));
    graph.add_vertex("again", Unit::func(|_, state| state.update_as::<u32, _>("n", |n| n * 10)));
    graph.add_edge("count", "again");

    let base: SharedState = Arc::new(BaseState::new());
    base.set("n", json!(4));
    let overlay = Arc::new(OverlayState::new(Arc::clone(&base)));
    let view: SharedState = overlay.clone();

    build_worker(&graph)
        .unwrap()
        .work(&RunContext::background(), &view, WorkParams::default())
        .unwrap();

    assert_eq!(base.load::<u32>("n"), Some(4));
    assert_eq!(overlay.load::<u32>("n"), Some(50));
    overlay.sync();
    assert_eq!(base.load::<u32>("n"), Some(50));
}

#[test]
fn test_guard_hides_keys_from_units() {
    let mut graph = Graph::new();
    graph.add_vertex(
        "peek",
        Unit::func(|_, state| {
            anyhow::ensure!(state.get("token").is_none(), "token leaked");
            state.set("token", json!("overwritten"));
            state.set("seen", json!(true));
            Ok(())
        }),
    );

    let base: SharedState = Arc::new(BaseState::new());
    base.set("token", json!("secret"));
    let guarded: SharedState = Arc::new(GuardState::new(Arc::clone(&base), |key| {
        if key == "token" {
            Access::NONE
        } else {
            Access::READ | Access::WRITE
        }
    }));

    build_worker(&graph)
        .unwrap()
        .work(&RunContext::background(), &guarded, WorkParams::default())
        .unwrap();

    assert_eq!(base.get("token"), Some(json!("secret")));
    assert_eq!(base.get("seen"), Some(json!(true)));
}

#[test]
fn test_permissive_guard_passes_through() {
    let base: SharedState = Arc::new(BaseState::new());
    let guard = GuardState::permissive(Arc::clone(&base));
    guard.save("k", &7_u8, true).unwrap();
    assert_eq!(base.load::<u8>("k"), Some(7));
    assert_eq!(guard.load::<u8>("k"), Some(7));
}

#[test]
fn test_contained_panic_inside_update_keeps_value() {
    let mut graph = Graph::new();
    graph.add_vertex(
        "bump",
        Unit::func(|_, state| {
            state.update("k", &mut |_| panic!("bad update"));
            Ok(())
        }),
    );

    let base: SharedState = Arc::new(BaseState::new());
    base.set("k", json!(1));
    let overlay = Arc::new(OverlayState::new(Arc::clone(&base)));
    overlay.set("k", json!(5));
    let worker = build_worker(&graph).unwrap();

    let err = worker
        .work(&RunContext::background(), &base, WorkParams::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "worker panic on bump, info: bad update");
    assert_eq!(base.get("k"), Some(json!(1)));

    let view: SharedState = overlay.clone();
    assert!(worker
        .work(&RunContext::background(), &view, WorkParams::default())
        .is_err());
    assert_eq!(overlay.get("k"), Some(json!(5)));
}
