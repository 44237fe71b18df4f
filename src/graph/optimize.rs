//! Precomputed scheduling layout.

use std::borrow::Cow;
use std::cmp::Reverse;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Graph, Group, VertexId};

/// Heads, groups, and schedule count derived from a graph's structure.
///
/// A vertex is *complex* when it has more than one dependency or more than
/// one successor. Runs of non-complex vertices linked one to one are collapsed
/// into a single group so that a worker executes them back to back without a
/// round trip through the scheduler.
#[derive(Debug, Clone)]
pub struct Layout {
    heads: Vec<VertexId>,
    groups: Vec<Option<Group>>,
    schedule_num: usize,
    collapsed: bool,
}

impl Layout {
    /// Compute the layout of `graph` using its current successor order.
    ///
    /// With `collapse` unset every vertex is its own group.
    pub fn compute<E>(graph: &Graph<E>, collapse: bool) -> Self {
        let vertices = &graph.vertices;
        let is_complex = |id: VertexId| {
            vertices[id].dependencies.len() > 1 || vertices[id].next.len() > 1
        };

        let mut heads: Vec<VertexId> = (0..vertices.len())
            .filter(|&id| vertices[id].dependencies.is_empty())
            .collect();
        heads.sort_by_key(|&id| Reverse(vertices[id].priority));

        let mut groups: Vec<Option<Group>> = vec![None; vertices.len()];
        for id in 0..vertices.len() {
            if !collapse || is_complex(id) {
                groups[id] = Some(Arc::from([id]));
                continue;
            }

            let starts_chain = vertices[id]
                .dependencies
                .first()
                .is_none_or(|&dep| is_complex(dep));
            if !starts_chain {
                continue;
            }

            let mut chain = vec![id];
            let mut cur = id;
            while let [next] = vertices[cur].next.as_slice() {
                let next = *next;
                if is_complex(next) {
                    break;
                }
                chain.push(next);
                cur = next;
            }
            groups[id] = Some(chain.into());
        }

        let collapsed_away: usize = groups.iter().flatten().map(|group| group.len() - 1).sum();
        let schedule_num = vertices.len() - collapsed_away;
        Self {
            heads,
            groups,
            schedule_num,
            collapsed: collapse,
        }
    }

    /// Vertices without dependencies, highest priority first.
    #[must_use]
    pub fn heads(&self) -> &[VertexId] {
        &self.heads
    }

    /// Group that starts at `id`; `None` for interior chain members.
    #[must_use]
    pub fn group(&self, id: VertexId) -> Option<&Group> {
        self.groups.get(id).and_then(Option::as_ref)
    }

    /// All groups, ordered by their first vertex's registration.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().flatten()
    }

    /// Number of scheduling units in one full pass.
    ///
    /// Counts every vertex, minus the members folded into a chain head. On a
    /// cyclic graph this exceeds what a pass can complete.
    #[must_use]
    pub const fn schedule_num(&self) -> usize {
        self.schedule_num
    }

    /// Whether chains were collapsed into multi-vertex groups.
    #[must_use]
    pub const fn is_collapsed(&self) -> bool {
        self.collapsed
    }
}

impl<E> Graph<E> {
    /// Sort successor lists by priority and precompute the scheduling layout.
    ///
    /// Ties keep registration and edge insertion order.
    pub fn optimize(&mut self) {
        let priorities: Vec<i32> = self.vertices.iter().map(|v| v.priority).collect();
        for vertex in &mut self.vertices {
            vertex.next.sort_by_key(|&id| Reverse(priorities[id]));
        }

        let layout = Layout::compute(self, true);
        debug!(
            vertices = self.vertices.len(),
            heads = layout.heads.len(),
            schedule_num = layout.schedule_num,
            "graph optimized"
        );
        self.layout = Some(layout);
    }

    /// Number of scheduling units of a collapsed pass over this graph.
    #[must_use]
    pub fn schedule_num(&self) -> usize {
        self.plan(true).schedule_num()
    }

    /// Groups of a collapsed pass, as vertex names.
    #[must_use]
    pub fn group_names(&self) -> Vec<Vec<String>> {
        self.plan(true)
            .groups()
            .map(|group| self.names(group))
            .collect()
    }

    /// Layout for one scheduling pass.
    ///
    /// Reuses the optimized layout when collapsing; otherwise builds a
    /// transient one.
    pub(crate) fn plan(&self, collapse: bool) -> Cow<'_, Layout> {
        match &self.layout {
            Some(layout) if collapse => Cow::Borrowed(layout),
            _ => {
                if collapse {
                    warn!("scheduling an unoptimized graph");
                }
                Cow::Owned(Layout::compute(self, collapse))
            }
        }
    }
}
