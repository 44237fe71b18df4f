//! Tests for error types

use std::time::Duration;

use dagflow::core::{ContextError, EngineError};

#[test]
fn test_execution_error_display() {
    let err = EngineError::Execution {
        vertex: "fetch".into(),
        source: anyhow::anyhow!("connection reset"),
    };
    assert_eq!(err.to_string(), "fetch failed, error: connection reset");
    assert_eq!(err.vertex(), Some("fetch"));
}

#[test]
fn test_cycle_error_lists_vertices() {
    let err = EngineError::Cycle {
        vertices: vec!["a".into(), "b".into()],
    };
    assert_eq!(err.to_string(), r#"found cycle between vertices: ["a", "b"]"#);
    assert_eq!(err.vertex(), None);
}

#[test]
fn test_incomplete_schedule_display() {
    let err = EngineError::IncompleteSchedule {
        completed: 1,
        expected: 3,
    };
    assert!(err.to_string().contains("1/3"));
}

#[test]
fn test_timeout_detected_through_execution() {
    let timeout = EngineError::Timeout {
        budget: Duration::from_millis(5),
    };
    assert!(timeout.is_timeout());

    let wrapped = EngineError::Execution {
        vertex: "slow".into(),
        source: anyhow::Error::new(timeout),
    };
    assert!(wrapped.is_timeout());

    let other = EngineError::Execution {
        vertex: "slow".into(),
        source: anyhow::anyhow!("nope"),
    };
    assert!(!other.is_timeout());
}

#[test]
fn test_context_error_conversion() {
    let err: EngineError = ContextError::Cancelled.into();
    assert!(matches!(err, EngineError::Context(ContextError::Cancelled)));
    assert_eq!(err.to_string(), "context canceled");

    let err: EngineError = ContextError::DeadlineExceeded.into();
    assert_eq!(err.to_string(), "context deadline exceeded");
}

#[test]
fn test_io_error_becomes_spawn() {
    let err: EngineError = std::io::Error::other("no threads").into();
    assert!(matches!(err, EngineError::Spawn(_)));
}
