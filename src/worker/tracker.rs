//! Per-vertex timing events.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Lifecycle event recorded for a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    /// Passed the pause gate and context check.
    Ready,
    /// About to run.
    Start,
    /// Returned.
    End,
    /// Bookkeeping for the vertex is finished.
    Complete,
}

/// A recorded event with its offset from the tracker's start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    /// Vertex the event belongs to.
    pub vertex: String,
    /// Which event.
    pub kind: TraceKind,
    /// Time since the tracker was created.
    pub at: Duration,
}

/// Append-only event log shared by the workers of a run.
#[derive(Debug)]
pub struct Tracker {
    started: Instant,
    events: Mutex<Vec<TraceEvent>>,
}

impl Tracker {
    /// Start an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Append an event for `vertex`.
    pub fn record(&self, vertex: &str, kind: TraceKind) {
        let mut events = self.events.lock();
        events.push(TraceEvent {
            vertex: vertex.to_owned(),
            kind,
            at: self.started.elapsed(),
        });
    }

    /// Snapshot of every event in recording order.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Index of the first `kind` event for `vertex` in recording order.
    #[must_use]
    pub fn position(&self, vertex: &str, kind: TraceKind) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|event| event.vertex == vertex && event.kind == kind)
    }

    /// Start-to-end time of every vertex that finished, slowest first.
    #[must_use]
    pub fn costs(&self) -> Vec<(String, Duration)> {
        let events = self.events.lock();
        let mut started: HashMap<&str, Duration> = HashMap::new();
        let mut costs = Vec::new();

        for event in events.iter() {
            match event.kind {
                TraceKind::Start => {
                    started.insert(&event.vertex, event.at);
                }
                TraceKind::End => {
                    if let Some(start) = started.get(event.vertex.as_str()) {
                        costs.push((event.vertex.clone(), event.at.saturating_sub(*start)));
                    }
                }
                TraceKind::Ready | TraceKind::Complete => {}
            }
        }

        costs.sort_by(|a, b| b.1.cmp(&a.1));
        costs
    }

    /// Time since the tracker was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
