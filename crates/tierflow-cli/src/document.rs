//! The JSON graph document read by the CLI.

use std::collections::BTreeMap;

use serde::Deserialize;

use tierflow::{
    collaborator::{MemoryCanvas, PreviewRegistry},
    geometry::ViewTransform,
    model::{Edge, GraphNode, OpenBranch},
};

/// A workflow graph as exported by an editor.
///
/// ```json
/// {
///   "nodes": [{ "id": "start", "kind": "start", "position": { "x": 0, "y": 0 } }],
///   "edges": [{ "id": "e1", "source": "start", "target": "end" }],
///   "branches": { "start": [{ "id": "single" }] },
///   "transform": { "tx": 0, "ty": 0, "sx": 1, "sy": 1 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Declared branches per node. Absent means no preview collaborator.
    #[serde(default)]
    pub branches: Option<BTreeMap<String, Vec<OpenBranch>>>,
    #[serde(default)]
    pub transform: Option<ViewTransform>,
}

impl GraphDocument {
    pub fn canvas(&self) -> MemoryCanvas {
        let mut canvas = MemoryCanvas::new(self.nodes.iter().cloned(), self.edges.clone());
        if let Some(transform) = self.transform {
            canvas.set_view_transform(transform);
        }
        canvas
    }

    /// Branch registry, or `None` when the document declares no branches
    pub fn preview(&self) -> Option<PreviewRegistry> {
        let branches = self.branches.as_ref()?;
        let mut registry = PreviewRegistry::new();
        for (source_id, declared) in branches {
            registry.declare_all(source_id.as_str(), declared.iter().cloned());
        }
        Some(registry)
    }
}

#[cfg(test)]
mod tests {
    use tierflow::{
        collaborator::{BranchPreview, Canvas},
        node::NodeLike,
    };

    use super::*;

    #[test]
    fn test_minimal_document() {
        let document: GraphDocument =
            serde_json::from_str(r#"{"nodes": [{"id": "a"}]}"#).unwrap();

        assert_eq!(document.nodes.len(), 1);
        assert!(document.edges.is_empty());
        assert!(document.preview().is_none());
        assert_eq!(document.canvas().nodes()[0].id(), "a");
    }

    #[test]
    fn test_branches_become_registry() {
        let document: GraphDocument = serde_json::from_str(
            r#"{
                "nodes": [{"id": "s", "kind": "split"}],
                "branches": {"s": [{"id": "b1", "label": "Yes"}, {"id": "b2"}]}
            }"#,
        )
        .unwrap();

        let registry = document.preview().unwrap();
        let branches = registry.open_branches(&document.nodes[0]);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].label(), Some("Yes"));
    }
}
