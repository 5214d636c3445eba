//! Node kinds and the [`NodeLike`] abstraction.
//!
//! The layout engine treats real graph nodes and placeholder markers for open
//! branches uniformly through [`NodeLike`]. Positions stored on a node are
//! top-left corners; [`NodeLike::center`] and [`NodeLike::set_center`] derive
//! the center-based view the layout math works with.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Size};

/// Size of the marker drawn for a virtual endpoint.
pub const ENDPOINT_MARKER_SIZE: Size = Size::new(20.0, 20.0);

/// The role a node plays in a workflow.
///
/// Parsing is lenient: unrecognized names map to [`NodeKind::Action`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum NodeKind {
    /// Entry point of a workflow.
    Start,
    /// Any single-successor step.
    #[default]
    Action,
    /// A node that fans out into several labeled branches.
    Split,
    /// Terminal node.
    End,
    /// Placeholder for an open branch. Never stored in the graph.
    Endpoint,
}

impl NodeKind {
    /// Returns the canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Action => "action",
            Self::Split => "split",
            Self::End => "end",
            Self::Endpoint => "endpoint",
        }
    }

    /// Returns true for kinds that declare multiple outgoing branches
    pub fn is_split(self) -> bool {
        matches!(self, Self::Split)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "split" | "condition" | "crowd-split" | "audience-split" | "event-split" | "ab-test" => {
                Self::Split
            }
            "end" | "finish" => Self::End,
            "endpoint" => Self::Endpoint,
            _ => Self::Action,
        };
        Ok(kind)
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<NodeKind> for &'static str {
    fn from(kind: NodeKind) -> Self {
        kind.as_str()
    }
}

/// Common accessors for anything the layout engine can position.
pub trait NodeLike {
    /// Unique identifier
    fn id(&self) -> &str;

    /// Role of the node
    fn kind(&self) -> NodeKind;

    /// Top-left corner in logical coordinates
    fn position(&self) -> Point;

    /// Moves the top-left corner
    fn set_position(&mut self, position: Point);

    /// Rendered size
    fn size(&self) -> Size;

    /// True for placeholders that do not exist in the graph model
    fn is_virtual(&self) -> bool {
        false
    }

    /// Owning node and branch ids for placeholders, `None` for real nodes
    fn endpoint_origin(&self) -> Option<(&str, &str)> {
        None
    }

    /// Center point in logical coordinates
    fn center(&self) -> Point {
        self.position().add_point(self.size().half())
    }

    /// Moves the node so its center lands on `center`
    fn set_center(&mut self, center: Point) {
        let top_left = center.sub_point(self.size().half());
        self.set_position(top_left);
    }
}

/// Placeholder node standing in for a branch that has no real target yet.
///
/// Endpoints are recreated on every layout run. Their identity is derived
/// from the owning node and branch, so the same open branch always maps to
/// the same endpoint id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualEndpoint {
    id: String,
    source_id: String,
    branch_id: String,
    branch_label: Option<String>,
    position: Point,
}

impl VirtualEndpoint {
    /// Creates an endpoint centered on `center`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tierflow_core::{geometry::Point, node::{NodeLike, VirtualEndpoint}};
    /// let endpoint = VirtualEndpoint::new("split_1", "b2", Some("Other".into()), Point::new(40.0, 100.0));
    /// assert_eq!(endpoint.id(), "endpoint_split_1_b2");
    /// assert_eq!(endpoint.center(), Point::new(40.0, 100.0));
    /// ```
    pub fn new(
        source_id: impl Into<String>,
        branch_id: impl Into<String>,
        branch_label: Option<String>,
        center: Point,
    ) -> Self {
        let source_id = source_id.into();
        let branch_id = branch_id.into();
        let mut endpoint = Self {
            id: Self::endpoint_id(&source_id, &branch_id),
            source_id,
            branch_id,
            branch_label,
            position: Point::default(),
        };
        endpoint.set_center(center);
        endpoint
    }

    /// Deterministic id for the endpoint of `branch_id` on `source_id`
    pub fn endpoint_id(source_id: &str, branch_id: &str) -> String {
        format!("endpoint_{source_id}_{branch_id}")
    }

    /// Id of the node owning the open branch
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Id of the open branch
    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    /// Optional human-readable branch label
    pub fn branch_label(&self) -> Option<&str> {
        self.branch_label.as_deref()
    }
}

impl NodeLike for VirtualEndpoint {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Endpoint
    }

    fn position(&self) -> Point {
        self.position
    }

    fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    fn size(&self) -> Size {
        ENDPOINT_MARKER_SIZE
    }

    fn is_virtual(&self) -> bool {
        true
    }

    fn endpoint_origin(&self) -> Option<(&str, &str)> {
        Some((&self.source_id, &self.branch_id))
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_node_kind_parsing() {
        assert_eq!("start".parse::<NodeKind>().unwrap(), NodeKind::Start);
        assert_eq!("SPLIT".parse::<NodeKind>().unwrap(), NodeKind::Split);
        assert_eq!("audience-split".parse::<NodeKind>().unwrap(), NodeKind::Split);
        assert_eq!("condition".parse::<NodeKind>().unwrap(), NodeKind::Split);
        assert_eq!("Crowd-Split".parse::<NodeKind>().unwrap(), NodeKind::Split);
        assert_eq!("finish".parse::<NodeKind>().unwrap(), NodeKind::End);
        assert_eq!(" end ".parse::<NodeKind>().unwrap(), NodeKind::End);
        assert_eq!("sms".parse::<NodeKind>().unwrap(), NodeKind::Action);
        assert!(NodeKind::Split.is_split());
        assert!(!NodeKind::Action.is_split());
    }

    #[test]
    fn test_node_kind_serde() {
        let kind: NodeKind = serde_json::from_str("\"ab-test\"").unwrap();
        assert_eq!(kind, NodeKind::Split);
        assert_eq!(serde_json::to_string(&NodeKind::End).unwrap(), "\"end\"");
    }

    #[test]
    fn test_endpoint_identity() {
        let a = VirtualEndpoint::new("n1", "virtual", None, Point::new(0.0, 0.0));
        let b = VirtualEndpoint::new("n1", "virtual", None, Point::new(50.0, 50.0));
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id(), "endpoint_n1_virtual");
        assert_eq!(a.kind(), NodeKind::Endpoint);
        assert!(a.is_virtual());
    }

    #[test]
    fn test_endpoint_origin_with_underscores() {
        let endpoint = VirtualEndpoint::new("a_b", "c_d", None, Point::default());
        assert_eq!(endpoint.id(), "endpoint_a_b_c_d");
        assert_eq!(endpoint.endpoint_origin(), Some(("a_b", "c_d")));
    }

    #[test]
    fn test_endpoint_center_and_position() {
        let mut endpoint = VirtualEndpoint::new("n1", "b1", None, Point::new(100.0, 50.0));
        assert_approx_eq!(f64, endpoint.position().x(), 90.0);
        assert_approx_eq!(f64, endpoint.position().y(), 40.0);

        endpoint.set_center(Point::new(-80.0, 400.0));
        assert_eq!(endpoint.center(), Point::new(-80.0, 400.0));
    }
}
