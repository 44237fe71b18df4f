//! Dependency graph of named vertices.
//!
//! Vertices live in an arena indexed by [`VertexId`]; adjacency is stored as
//! index lists in both directions. Structure is fixed once a run starts: only
//! the per-run status table (behind the graph's run lock) changes while the
//! scheduler walks the graph.
//!
//! - [`optimize`] precomputes heads, priority order, and collapsed chains.
//! - [`check`] levels the graph to detect cycles offline.
//! - [`marshal`] converts to and from a serializable vertex/edge listing.

pub mod check;
pub mod marshal;
pub mod optimize;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

pub use marshal::GraphData;
pub use optimize::Layout;

/// Index of a vertex within its graph.
pub type VertexId = usize;

/// Ordered vertices that are scheduled and executed as one unit.
pub type Group = Arc<[VertexId]>;

/// Per-run progress of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not yet handed to a worker.
    Todo,
    /// Handed to a worker.
    Doing,
    /// Finished.
    Done,
}

/// A named vertex and its adjacency.
#[derive(Debug, Clone)]
pub struct Vertex<E> {
    name: String,
    payload: E,
    priority: i32,
    dependencies: Vec<VertexId>,
    next: Vec<VertexId>,
}

impl<E> Vertex<E> {
    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attached payload.
    pub const fn payload(&self) -> &E {
        &self.payload
    }

    /// Scheduling priority; higher is scheduled first among siblings.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Vertices this one waits for.
    #[must_use]
    pub fn dependencies(&self) -> &[VertexId] {
        &self.dependencies
    }

    /// Vertices waiting for this one.
    #[must_use]
    pub fn successors(&self) -> &[VertexId] {
        &self.next
    }
}

/// Mutable per-run bookkeeping, owned by whoever holds the run lock.
#[derive(Debug, Default)]
pub(crate) struct RunTable {
    pub(crate) status: Vec<Status>,
    pub(crate) wait: Vec<usize>,
}

/// Directed graph of named vertices with payload `E`.
#[derive(Debug)]
pub struct Graph<E> {
    vertices: Vec<Vertex<E>>,
    index: HashMap<String, VertexId>,
    edges: Vec<(VertexId, VertexId)>,
    layout: Option<Layout>,
    run: Mutex<RunTable>,
}

impl<E> Graph<E> {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            layout: None,
            run: Mutex::new(RunTable::default()),
        }
    }

    /// Add a vertex, or replace the payload of an existing one (edges are kept).
    pub fn add_vertex(&mut self, name: impl Into<String>, payload: E) -> VertexId {
        let name = name.into();
        self.layout = None;

        if let Some(&id) = self.index.get(&name) {
            self.vertices[id].payload = payload;
            return id;
        }

        let id = self.vertices.len();
        self.index.insert(name.clone(), id);
        self.vertices.push(Vertex {
            name,
            payload,
            priority: 0,
            dependencies: Vec::new(),
            next: Vec::new(),
        });

        let run = self.run.get_mut();
        run.status.push(Status::Todo);
        run.wait.push(0);
        id
    }

    /// Add the edge `from → to`.
    ///
    /// Duplicate edges and edges naming an unknown vertex are ignored.
    /// Returns `true` if the edge was added.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        if self.vertices[from].next.contains(&to) {
            return false;
        }

        self.vertices[from].next.push(to);
        self.vertices[to].dependencies.push(from);
        self.edges.push((from, to));
        self.layout = None;
        true
    }

    /// Set the priority of `name`. Returns `false` if the vertex is unknown.
    pub fn set_priority(&mut self, name: &str, priority: i32) -> bool {
        let Some(&id) = self.index.get(name) else {
            return false;
        };
        self.vertices[id].priority = priority;
        self.layout = None;
        true
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if the graph has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &Vertex<E> {
        &self.vertices[id]
    }

    /// Id of the vertex called `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<VertexId> {
        self.index.get(name).copied()
    }

    /// Vertex called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Vertex<E>> {
        self.id_of(name).map(|id| &self.vertices[id])
    }

    /// Vertices in registration order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<E>> {
        self.vertices.iter()
    }

    /// Edges as `(from, to)` names, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .map(|&(from, to)| (self.vertices[from].name(), self.vertices[to].name()))
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Names of `ids`, in order.
    #[must_use]
    pub fn names(&self, ids: &[VertexId]) -> Vec<String> {
        ids.iter().map(|&id| self.vertices[id].name.clone()).collect()
    }

    /// Layout computed by the last [`optimize`](Self::optimize), if still valid.
    #[must_use]
    pub const fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Status of `name` as left by the most recent scheduling pass.
    #[must_use]
    pub fn status_of(&self, name: &str) -> Option<Status> {
        let id = self.id_of(name)?;
        Some(self.run.lock().status[id])
    }

    /// Build a graph with the same vertices, edges, and priorities whose
    /// payloads are produced by `f`.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn map<N, Err, F>(&self, mut f: F) -> Result<Graph<N>, Err>
    where
        F: FnMut(&str, &E) -> Result<N, Err>,
    {
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            vertices.push(Vertex {
                name: vertex.name.clone(),
                payload: f(&vertex.name, &vertex.payload)?,
                priority: vertex.priority,
                dependencies: vertex.dependencies.clone(),
                next: vertex.next.clone(),
            });
        }

        let run = RunTable {
            status: vec![Status::Todo; vertices.len()],
            wait: vec![0; vertices.len()],
        };

        Ok(Graph {
            vertices,
            index: self.index.clone(),
            edges: self.edges.clone(),
            layout: None,
            run: Mutex::new(run),
        })
    }

    /// Acquire the run lock. Held for the whole of a scheduling pass.
    pub(crate) fn lock_run(&self) -> MutexGuard<'_, RunTable> {
        self.run.lock()
    }
}

impl<E> Default for Graph<E> {
    fn default() -> Self {
        Self::new()
    }
}
