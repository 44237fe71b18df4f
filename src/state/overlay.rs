//! Copy-on-write shadow over another state.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::{SharedState, State};

/// Writes land in a private upper map; reads fall through to the lower state.
///
/// Concurrent branches each get their own overlay over one shared lower
/// state, run in isolation, and the chosen branch is merged with
/// [`sync`](Self::sync).
pub struct OverlayState {
    upper: RwLock<HashMap<String, Value>>,
    lower: SharedState,
}

impl OverlayState {
    /// Create an empty overlay over `lower`.
    #[must_use]
    pub fn new(lower: SharedState) -> Self {
        Self {
            upper: RwLock::new(HashMap::new()),
            lower,
        }
    }

    /// Flush every upper entry into the lower state and clear the upper map.
    pub fn sync(&self) {
        let drained: Vec<(String, Value)> = self.upper.write().drain().collect();
        for (key, value) in drained {
            self.lower.set(&key, value);
        }
    }

    /// Number of keys written to the overlay since the last sync.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.upper.read().len()
    }

    /// The state this overlay reads through to.
    #[must_use]
    pub fn lower(&self) -> &SharedState {
        &self.lower
    }
}

impl State for OverlayState {
    fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.upper.read().get(key) {
            return Some(value.clone());
        }
        self.lower.get(key)
    }

    fn set(&self, key: &str, value: Value) {
        self.upper.write().insert(key.to_owned(), value);
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value) {
        let mut upper = self.upper.write();
        let old = match upper.get(key) {
            Some(value) => Some(value.clone()),
            None => self.lower.get(key),
        };
        let new = f(old);
        upper.insert(key.to_owned(), new);
    }
}

impl std::fmt::Debug for OverlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayState")
            .field("upper", &*self.upper.read())
            .finish_non_exhaustive()
    }
}
