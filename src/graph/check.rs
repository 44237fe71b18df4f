//! Offline leveling and cycle detection.

use super::{Graph, VertexId};
use crate::core::EngineError;

impl<E> Graph<E> {
    /// Level the graph with Kahn's algorithm, ignoring groups.
    ///
    /// Returns the levels as vertex names and the names that could not be
    /// leveled. A non-empty remainder means the graph has a cycle. Works on a
    /// private copy of the wait counts and never takes the run lock.
    #[must_use]
    pub fn steps(&self) -> (Vec<Vec<String>>, Vec<String>) {
        let mut wait: Vec<usize> = self.vertices.iter().map(|v| v.dependencies.len()).collect();
        let mut leveled = vec![false; self.vertices.len()];

        let mut current: Vec<VertexId> = (0..self.vertices.len())
            .filter(|&id| wait[id] == 0)
            .collect();
        let mut levels = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &id in &current {
                leveled[id] = true;
                for &succ in &self.vertices[id].next {
                    wait[succ] -= 1;
                    if wait[succ] == 0 {
                        next.push(succ);
                    }
                }
            }
            levels.push(self.names(&current));
            current = next;
        }

        let left = (0..self.vertices.len())
            .filter(|&id| !leveled[id])
            .map(|id| self.vertices[id].name.clone())
            .collect();
        (levels, left)
    }

    /// Fail if the graph contains a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cycle`] naming every vertex that could not be
    /// leveled.
    pub fn check(&self) -> Result<(), EngineError> {
        let (_, left) = self.steps();
        if left.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Cycle { vertices: left })
        }
    }
}
