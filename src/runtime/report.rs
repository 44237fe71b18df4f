//! Serializable run outcome.

use serde::{Deserialize, Serialize};

use crate::core::EngineError;
use crate::worker::{TraceKind, Tracker};

/// Timing of one vertex within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexCost {
    /// Vertex name.
    pub vertex: String,
    /// Start-to-end time in microseconds.
    pub micros: u64,
}

/// Outcome of the most recent run of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier used in log lines.
    pub run_id: String,
    /// Whether the run succeeded.
    pub ok: bool,
    /// Failing vertex, if the error names one.
    pub failed_vertex: Option<String>,
    /// Error message of a failed run.
    pub error: Option<String>,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
    /// Whether the run exceeded the slow threshold.
    pub slow: bool,
    /// Per-vertex costs, slowest first. Empty unless tracking is enabled.
    pub costs: Vec<VertexCost>,
    /// Vertices that started but never ended. Empty unless tracking is enabled.
    pub unfinished: Vec<String>,
}

impl RunReport {
    pub(crate) fn new(
        run_id: String,
        outcome: &Result<(), EngineError>,
        elapsed_ms: u64,
        slow: bool,
        tracker: Option<&Tracker>,
    ) -> Self {
        let (costs, unfinished) = tracker.map_or_else(Default::default, |tracker| {
            let costs = tracker
                .costs()
                .into_iter()
                .map(|(vertex, cost)| VertexCost {
                    vertex,
                    micros: u64::try_from(cost.as_micros()).unwrap_or(u64::MAX),
                })
                .collect();
            let events = tracker.events();
            let unfinished = events
                .iter()
                .filter(|e| e.kind == TraceKind::Start)
                .filter(|s| {
                    !events
                        .iter()
                        .any(|e| e.kind == TraceKind::End && e.vertex == s.vertex)
                })
                .map(|s| s.vertex.clone())
                .collect();
            (costs, unfinished)
        });

        Self {
            run_id,
            ok: outcome.is_ok(),
            failed_vertex: outcome
                .as_ref()
                .err()
                .and_then(EngineError::vertex)
                .map(str::to_owned),
            error: outcome.as_ref().err().map(ToString::to_string),
            elapsed_ms,
            slow,
            costs,
            unfinished,
        }
    }

    /// The `n` slowest vertices as `name=<micros>us`, comma separated.
    ///
    /// Empty when the run was not tracked.
    #[must_use]
    pub fn slowest(&self, n: usize) -> String {
        self.costs
            .iter()
            .take(n)
            .map(|cost| format!("{}={}us", cost.vertex, cost.micros))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
