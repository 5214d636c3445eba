//! Workflow graph model.
//!
//! These are the in-memory shapes exchanged with the graph and branch/preview
//! collaborators. Everything derives `serde` traits so that hosts can hand
//! over a JSON snapshot of their canvas.

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Point, Size},
    node::{NodeKind, NodeLike},
};

/// Marker flags attached to a node by the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeData {
    /// The node is a preview artifact drawn while dragging a connection.
    pub is_preview: bool,
    /// The node is an endpoint marker rendered by the preview subsystem.
    pub is_endpoint: bool,
}

/// A real node of the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    id: String,
    #[serde(default)]
    kind: NodeKind,
    /// Top-left corner.
    #[serde(default)]
    position: Point,
    #[serde(default = "default_node_size")]
    size: Size,
    #[serde(default)]
    data: NodeData,
}

fn default_node_size() -> Size {
    Size::new(120.0, 40.0)
}

impl GraphNode {
    /// Creates a node at the given top-left position
    pub fn new(id: impl Into<String>, kind: NodeKind, position: Point, size: Size) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            size,
            data: NodeData::default(),
        }
    }

    /// Sets the editor flags for this node
    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    /// Returns the editor flags
    pub fn data(&self) -> NodeData {
        self.data
    }

    /// Returns true for drag hints and preview markers that must not be laid out
    pub fn is_transient(&self) -> bool {
        self.id.contains("hint") || self.data.is_preview || self.data.is_endpoint
    }
}

impl NodeLike for GraphNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn position(&self) -> Point {
        self.position
    }

    fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    fn size(&self) -> Size {
        self.size
    }
}

/// Whether an edge is part of the workflow or a transient preview line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Real,
    Preview,
}

/// Directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: String,
    source: String,
    target: String,
    #[serde(default)]
    kind: EdgeKind,
    #[serde(default)]
    branch_id: Option<String>,
    #[serde(default)]
    branch_label: Option<String>,
    /// Logical point where the edge terminates on its target.
    #[serde(default)]
    target_point: Option<Point>,
}

impl Edge {
    /// Creates a real edge between two nodes
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Real,
            branch_id: None,
            branch_label: None,
            target_point: None,
        }
    }

    /// Sets the edge kind
    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Records which branch of the source node this edge realizes
    pub fn with_branch(mut self, branch_id: impl Into<String>, label: Option<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self.branch_label = label;
        self
    }

    /// Records where the edge terminates
    pub fn with_target_point(mut self, point: Point) -> Self {
        self.target_point = Some(point);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn branch_id(&self) -> Option<&str> {
        self.branch_id.as_deref()
    }

    pub fn branch_label(&self) -> Option<&str> {
        self.branch_label.as_deref()
    }

    pub fn target_point(&self) -> Option<Point> {
        self.target_point
    }

    /// Returns true for preview lines, identified by kind or id convention
    pub fn is_preview(&self) -> bool {
        self.kind == EdgeKind::Preview || self.id.contains("preview")
    }
}

/// A branch declared on a node, as reported by the branch/preview collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenBranch {
    id: String,
    #[serde(default)]
    label: Option<String>,
    /// Last known position of the branch's dangling end.
    #[serde(default)]
    anchor: Option<Point>,
    /// The branch is already bound to a real edge.
    #[serde(default)]
    attached: bool,
}

impl OpenBranch {
    /// Creates an unattached branch with no label or anchor
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            anchor: None,
            attached: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_anchor(mut self, anchor: Point) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_attached(mut self, attached: bool) -> Self {
        self.attached = attached;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    /// Replaces the last known anchor
    pub fn set_anchor(&mut self, anchor: Point) {
        self.anchor = Some(anchor);
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_nodes() {
        let size = Size::new(120.0, 40.0);
        let regular = GraphNode::new("n1", NodeKind::Action, Point::default(), size);
        let hint = GraphNode::new("hint_n1_0", NodeKind::Action, Point::default(), size);
        let preview = GraphNode::new("n2", NodeKind::Action, Point::default(), size).with_data(
            NodeData {
                is_preview: true,
                ..NodeData::default()
            },
        );

        assert!(!regular.is_transient());
        assert!(hint.is_transient());
        assert!(preview.is_transient());
    }

    #[test]
    fn test_graph_node_center() {
        let node = GraphNode::new(
            "n1",
            NodeKind::Start,
            Point::new(-60.0, -20.0),
            Size::new(120.0, 40.0),
        );
        assert_eq!(node.center(), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_preview_edges() {
        assert!(!Edge::new("e1", "a", "b").is_preview());
        assert!(Edge::new("unified_preview_a", "a", "b").is_preview());
        assert!(
            Edge::new("e2", "a", "b")
                .with_kind(EdgeKind::Preview)
                .is_preview()
        );
    }

    #[test]
    fn test_graph_node_deserialize_defaults() {
        let node: GraphNode = serde_json::from_str(r#"{"id": "a", "kind": "split"}"#).unwrap();
        assert_eq!(node.kind(), NodeKind::Split);
        assert_eq!(node.size(), Size::new(120.0, 40.0));
        assert_eq!(node.position(), Point::default());
        assert_eq!(node.data(), NodeData::default());
    }

    #[test]
    fn test_edge_and_branch_deserialize() {
        let edge: Edge = serde_json::from_str(
            r#"{"id": "e1", "source": "s", "target": "t", "branch_id": "b1",
                "target_point": {"x": 10.0, "y": 20.0}}"#,
        )
        .unwrap();
        assert_eq!(edge.kind(), EdgeKind::Real);
        assert_eq!(edge.branch_id(), Some("b1"));
        assert_eq!(edge.target_point(), Some(Point::new(10.0, 20.0)));

        let branch: OpenBranch = serde_json::from_str(r#"{"id": "b2", "label": "Other"}"#).unwrap();
        assert_eq!(branch.label(), Some("Other"));
        assert!(!branch.is_attached());
        assert!(branch.anchor().is_none());
    }
}
