//! Graph preprocessing.
//!
//! Separates the nodes and edges that take part in the layout from transient
//! editor artifacts.

use std::collections::HashSet;

use log::debug;

use tierflow_core::{
    model::{Edge, GraphNode},
    node::NodeLike,
};

/// Output of [`preprocess`].
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    /// Real nodes, first occurrence of every id, in collaborator order.
    pub nodes: Vec<GraphNode>,
    /// Real edges whose endpoints are both valid nodes.
    pub edges: Vec<Edge>,
    /// Preview lines that were removed.
    pub preview_edges: Vec<Edge>,
    /// Number of transient nodes that were removed.
    pub dropped_nodes: usize,
}

impl Preprocessed {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Filters raw collaborator data down to layoutable nodes and edges.
///
/// Drag hints and preview markers are dropped, as are preview edges and
/// edges that reference a node that did not survive filtering.
pub fn preprocess(nodes: Vec<GraphNode>, edges: Vec<Edge>) -> Preprocessed {
    let mut result = Preprocessed::default();
    let mut seen = HashSet::new();

    for node in nodes {
        if node.is_transient() {
            result.dropped_nodes += 1;
            continue;
        }
        if !seen.insert(node.id().to_string()) {
            debug!(node_id = node.id(); "Skipping duplicate node id");
            continue;
        }
        result.nodes.push(node);
    }

    for edge in edges {
        if edge.is_preview() {
            result.preview_edges.push(edge);
        } else if seen.contains(edge.source()) && seen.contains(edge.target()) {
            result.edges.push(edge);
        } else {
            debug!(edge_id = edge.id(); "Dropping edge with unknown endpoint");
        }
    }

    debug!(
        nodes = result.nodes.len(),
        edges = result.edges.len(),
        preview_edges = result.preview_edges.len(),
        dropped_nodes = result.dropped_nodes;
        "Preprocessed graph"
    );

    result
}
