//! Serializable graph listing and DOT export.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Graph;

/// Vertex and edge listing of a graph.
///
/// Only structure and payloads are kept; priorities and groups are
/// recomputed when the graph is optimized again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphData<E> {
    /// Payload by vertex name.
    pub vertices: BTreeMap<String, E>,
    /// `[from, to]` pairs.
    pub edges: Vec<[String; 2]>,
}

impl<E> GraphData<E> {
    /// Rebuild a graph. Vertices are registered in name order.
    #[must_use]
    pub fn into_graph(self) -> Graph<E> {
        let mut graph = Graph::new();
        for (name, payload) in self.vertices {
            graph.add_vertex(name, payload);
        }
        for [from, to] in &self.edges {
            graph.add_edge(from, to);
        }
        graph
    }
}

impl<E: Clone> Graph<E> {
    /// Snapshot the graph's vertices and edges.
    #[must_use]
    pub fn to_data(&self) -> GraphData<E> {
        GraphData {
            vertices: self
                .vertices
                .iter()
                .map(|v| (v.name.clone(), v.payload.clone()))
                .collect(),
            edges: self
                .edges()
                .map(|(from, to)| [from.to_owned(), to.to_owned()])
                .collect(),
        }
    }
}

impl<E> Graph<E> {
    /// Rebuild a graph from a listing.
    #[must_use]
    pub fn from_data(data: GraphData<E>) -> Self {
        data.into_graph()
    }

    /// Render the graph in Graphviz DOT syntax.
    #[must_use]
    pub fn to_dot(&self, name: &str) -> String {
        let mut out = format!("digraph {name} {{\n");
        for vertex in &self.vertices {
            let _ = writeln!(
                out,
                "\t\"{0}\" [shape=record, label=\"{{Name: {0}|Priority: {1}}}\"];",
                vertex.name, vertex.priority
            );
        }
        for (from, to) in self.edges() {
            let _ = writeln!(out, "\t\"{from}\" -> \"{to}\";");
        }
        out.push_str("}\n");
        out
    }
}

impl<E: Clone + Serialize> Graph<E> {
    /// Serialize the graph listing as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload fails to serialize.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_data())
    }
}

impl<E: DeserializeOwned> Graph<E> {
    /// Parse a JSON graph listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid listing.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        let data: GraphData<E> = serde_json::from_str(input)?;
        Ok(data.into_graph())
    }
}
