//! Default shared state.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::State;

/// Lock-protected map; reads share the lock, writes and updates take it exclusively.
///
/// # Examples
///
/// ```
/// use dagflow::state::{BaseState, State};
/// use serde_json::json;
///
/// let state = BaseState::new();
/// state.set("answer", json!(41));
/// state.update("answer", &mut |v| json!(v.and_then(|v| v.as_i64()).unwrap_or(0) + 1));
/// assert_eq!(state.get("answer"), Some(json!(42)));
/// ```
#[derive(Debug, Default)]
pub struct BaseState {
    store: RwLock<HashMap<String, Value>>,
}

impl BaseState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}

impl State for BaseState {
    fn get(&self, key: &str) -> Option<Value> {
        self.store.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.store.write().insert(key.to_owned(), value);
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value) {
        let mut store = self.store.write();
        let new = f(store.get(key).cloned());
        store.insert(key.to_owned(), new);
    }
}
