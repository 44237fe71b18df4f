//! Cooperative pause condition.

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Gate that workers pass before each unit.
///
/// While paused, workers block at their next unit boundary; a running unit
/// is never interrupted. Waiting uses a condition variable, not polling.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl PauseGate {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate.
    pub fn pause(&self) {
        *self.paused.lock() = true;
        debug!("run paused");
    }

    /// Open the gate and wake every waiting worker.
    pub fn resume(&self) {
        let mut paused = self.paused.lock();
        *paused = false;
        self.resumed.notify_all();
        debug!("run resumed");
    }

    /// Returns `true` if the gate is closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Block until the gate is open.
    pub fn wait(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.resumed.wait(&mut paused);
        }
    }
}
