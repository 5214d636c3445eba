//! Virtual endpoint extraction.
//!
//! For every real node, the branch/preview collaborator reports the branches
//! declared on it. A branch that is not yet realized by a real edge gets a
//! [`VirtualEndpoint`] so the layout reserves room for its dangling end.
//!
//! Whether a branch is realized is decided, in order, by:
//!
//! 1. an edge recording the same branch id or label,
//! 2. an edge ending within `match_distance` of the branch anchor,
//! 3. for split nodes, comparing real outgoing edges with declared branches,
//! 4. for the `single` preview line of any other node, any outgoing edge.
//!
//! A named branch on a non-split node that fails rules 1 and 2 stays open.
//!
//! Rule 3 maps edges to branches by count and declaration order only. It can
//! attribute a connection to the wrong branch after reordering.

use std::collections::HashSet;

use log::{debug, trace, warn};

use tierflow_core::{
    geometry::Point,
    model::{Edge, GraphNode, OpenBranch},
    node::{NodeKind, NodeLike, VirtualEndpoint},
};

use crate::{collaborator::BranchPreview, config::LayoutConfig};

/// Branch id used for the generic endpoint created without a collaborator.
pub const GENERIC_BRANCH_ID: &str = "virtual";

/// Branch id used for the single preview line of a non-split node.
pub const SINGLE_BRANCH_ID: &str = "single";

/// Vertical distance below a node's center where an anchorless endpoint starts.
const DEFAULT_ENDPOINT_DROP: f64 = 100.0;

/// Decides which open branches need a placeholder.
#[derive(Debug, Clone)]
pub struct EndpointExtractor {
    match_distance: f64,
}

impl Default for EndpointExtractor {
    fn default() -> Self {
        Self {
            match_distance: 50.0,
        }
    }
}

impl EndpointExtractor {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            match_distance: config.match_distance(),
        }
    }

    /// Creates the endpoints for one layout run.
    ///
    /// Without a collaborator the extractor runs in degraded mode: every
    /// non-end node with no real outgoing edge receives one generic endpoint.
    pub fn extract(
        &self,
        nodes: &[GraphNode],
        edges: &[Edge],
        preview: Option<&dyn BranchPreview>,
    ) -> Vec<VirtualEndpoint> {
        let mut endpoints = Vec::new();
        let mut seen = HashSet::new();

        match preview {
            Some(preview) => {
                for node in nodes {
                    for endpoint in self.node_endpoints(node, edges, preview) {
                        if seen.insert(endpoint.id().to_string()) {
                            endpoints.push(endpoint);
                        }
                    }
                }
            }
            None => {
                warn!("Branch/preview collaborator unavailable, using generic endpoints");
                for node in nodes {
                    if node.kind() == NodeKind::End || has_outgoing(node, edges) {
                        continue;
                    }
                    let endpoint = VirtualEndpoint::new(
                        node.id(),
                        GENERIC_BRANCH_ID,
                        None,
                        default_anchor(node),
                    );
                    if seen.insert(endpoint.id().to_string()) {
                        endpoints.push(endpoint);
                    }
                }
            }
        }

        debug!(count = endpoints.len(); "Virtual endpoints extracted");
        endpoints
    }

    fn node_endpoints(
        &self,
        node: &GraphNode,
        edges: &[Edge],
        preview: &dyn BranchPreview,
    ) -> Vec<VirtualEndpoint> {
        let branches = preview.open_branches(node);
        if branches.is_empty() {
            return Vec::new();
        }

        let outgoing: Vec<&Edge> = edges.iter().filter(|e| e.source() == node.id()).collect();

        branches
            .iter()
            .enumerate()
            .filter(|(_, branch)| !branch.is_attached())
            .filter(|(index, branch)| {
                let connected = self.is_connected(node, branch, *index, branches.len(), &outgoing);
                trace!(node_id = node.id(), branch_id = branch.id(), connected; "Branch checked");
                !connected
            })
            .map(|(_, branch)| {
                let anchor = branch.anchor().filter(|p| p.is_finite());
                VirtualEndpoint::new(
                    node.id(),
                    branch.id(),
                    branch.label().map(str::to_string),
                    anchor.unwrap_or_else(|| default_anchor(node)),
                )
            })
            .collect()
    }

    /// Whether `branch` (declared at `index` out of `declared`) already has a real edge.
    fn is_connected(
        &self,
        node: &GraphNode,
        branch: &OpenBranch,
        index: usize,
        declared: usize,
        outgoing: &[&Edge],
    ) -> bool {
        let exact = outgoing.iter().any(|edge| {
            edge.branch_id() == Some(branch.id())
                || branch
                    .label()
                    .is_some_and(|label| edge.branch_label() == Some(label))
        });
        if exact {
            return true;
        }

        if let Some(anchor) = branch.anchor() {
            let near = outgoing.iter().any(|edge| {
                edge.target_point()
                    .is_some_and(|point| point.distance(anchor) <= self.match_distance)
            });
            if near {
                return true;
            }
        }

        if node.kind().is_split() {
            outgoing.len() >= declared || index < outgoing.len()
        } else {
            branch.id() == SINGLE_BRANCH_ID && !outgoing.is_empty()
        }
    }
}

fn has_outgoing(node: &GraphNode, edges: &[Edge]) -> bool {
    edges.iter().any(|edge| edge.source() == node.id())
}

fn default_anchor(node: &GraphNode) -> Point {
    node.center().add_point(Point::new(0.0, DEFAULT_ENDPOINT_DROP))
}

#[cfg(test)]
mod tests {
    use tierflow_core::geometry::Size;

    use super::*;
    use crate::collaborator::PreviewRegistry;

    fn node(id: &str, kind: NodeKind) -> GraphNode {
        GraphNode::new(id, kind, Point::new(0.0, 0.0), Size::new(120.0, 40.0))
    }

    fn ids(endpoints: &[VirtualEndpoint]) -> Vec<&str> {
        endpoints.iter().map(|e| e.id()).collect()
    }

    #[test]
    fn test_exact_branch_match() {
        let nodes = vec![node("s", NodeKind::Split), node("a", NodeKind::Action)];
        let edges = vec![Edge::new("e1", "s", "a").with_branch("b1", None)];
        let mut registry = PreviewRegistry::new();
        registry.declare_all("s", [OpenBranch::new("b1"), OpenBranch::new("b2")]);

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        assert_eq!(ids(&endpoints), ["endpoint_s_b2"]);
    }

    #[test]
    fn test_label_match() {
        let nodes = vec![node("s", NodeKind::Split), node("a", NodeKind::Action)];
        let edges = vec![Edge::new("e1", "s", "a").with_branch("other", Some("Yes".into()))];
        let mut registry = PreviewRegistry::new();
        registry.declare_all(
            "s",
            [
                OpenBranch::new("b1").with_label("Yes"),
                OpenBranch::new("b2").with_label("No"),
                OpenBranch::new("b3").with_label("Maybe"),
            ],
        );

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        // b1 matches by label; one real edge only covers declaration index 0
        assert_eq!(ids(&endpoints), ["endpoint_s_b2", "endpoint_s_b3"]);
    }

    #[test]
    fn test_geometric_match() {
        let nodes = vec![node("s", NodeKind::Split), node("a", NodeKind::Action)];
        let edges = vec![Edge::new("e1", "s", "a").with_target_point(Point::new(230.0, 310.0))];
        let mut registry = PreviewRegistry::new();
        registry.declare_all(
            "s",
            [
                OpenBranch::new("b1").with_anchor(Point::new(-200.0, 300.0)),
                OpenBranch::new("b2").with_anchor(Point::new(200.0, 300.0)),
                OpenBranch::new("b3").with_anchor(Point::new(0.0, 300.0)),
            ],
        );

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        // b1 falls back to declaration order; b2 is within 50 units of the edge end
        assert_eq!(ids(&endpoints), ["endpoint_s_b3"]);
        assert_eq!(endpoints[0].center(), Point::new(0.0, 300.0));
    }

    #[test]
    fn test_cardinality_covers_all_branches() {
        let nodes = vec![
            node("s", NodeKind::Split),
            node("a", NodeKind::Action),
            node("b", NodeKind::Action),
        ];
        let edges = vec![Edge::new("e1", "s", "a"), Edge::new("e2", "s", "b")];
        let mut registry = PreviewRegistry::new();
        registry.declare_all("s", [OpenBranch::new("x"), OpenBranch::new("y")]);

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        assert!(endpoints.is_empty());
    }

    #[test]
    fn test_attached_branches_are_skipped() {
        let nodes = vec![node("s", NodeKind::Split)];
        let mut registry = PreviewRegistry::new();
        registry.declare_all(
            "s",
            [
                OpenBranch::new("b1").with_attached(true),
                OpenBranch::new("b2"),
            ],
        );

        let endpoints = EndpointExtractor::default().extract(&nodes, &[], Some(&registry));
        assert_eq!(ids(&endpoints), ["endpoint_s_b2"]);
    }

    #[test]
    fn test_single_preview_line() {
        let nodes = vec![
            node("start", NodeKind::Start),
            node("a", NodeKind::Action),
            node("b", NodeKind::Action),
        ];
        let edges = vec![Edge::new("e1", "start", "a")];
        let mut registry = PreviewRegistry::new();
        registry
            .declare("start", OpenBranch::new(SINGLE_BRANCH_ID))
            .declare("a", OpenBranch::new(SINGLE_BRANCH_ID));

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        assert_eq!(ids(&endpoints), ["endpoint_a_single"]);
    }

    #[test]
    fn test_condition_node_keeps_unmatched_branches() {
        let kind: NodeKind = "condition".parse().unwrap();
        let nodes = vec![node("c", kind), node("a", NodeKind::Action)];
        let edges = vec![Edge::new("e1", "c", "a").with_branch("yes", None)];
        let mut registry = PreviewRegistry::new();
        registry.declare_all(
            "c",
            [OpenBranch::new("yes"), OpenBranch::new("no"), OpenBranch::new("other")],
        );

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        assert_eq!(ids(&endpoints), ["endpoint_c_no", "endpoint_c_other"]);
    }

    #[test]
    fn test_named_branches_on_non_split_node() {
        let nodes = vec![node("a", NodeKind::Action), node("b", NodeKind::Action)];
        let edges = vec![Edge::new("e1", "a", "b")];
        let mut registry = PreviewRegistry::new();
        registry.declare_all("a", [OpenBranch::new("opened"), OpenBranch::new("ignored")]);

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
        assert_eq!(ids(&endpoints), ["endpoint_a_opened", "endpoint_a_ignored"]);
    }

    #[test]
    fn test_degraded_mode() {
        let nodes = vec![
            node("start", NodeKind::Start),
            node("a", NodeKind::Action),
            node("end", NodeKind::End),
        ];
        let edges = vec![Edge::new("e1", "start", "a")];

        let endpoints = EndpointExtractor::default().extract(&nodes, &edges, None);
        assert_eq!(ids(&endpoints), ["endpoint_a_virtual"]);
        assert_eq!(endpoints[0].source_id(), "a");
        assert_eq!(endpoints[0].branch_id(), GENERIC_BRANCH_ID);
        // Anchorless endpoints start below their source
        assert_eq!(endpoints[0].center(), Point::new(60.0, 120.0));
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn matched_branches_never_get_endpoints(
                declared in 1usize..6,
                matched in proptest::collection::vec(any::<bool>(), 6),
            ) {
                let mut nodes = vec![node("s", NodeKind::Split)];
                let mut edges = Vec::new();
                let mut registry = PreviewRegistry::new();
                for i in 0..declared {
                    registry.declare("s", OpenBranch::new(format!("b{i}")));
                    if matched[i] {
                        nodes.push(node(&format!("t{i}"), NodeKind::Action));
                        edges.push(Edge::new(format!("e{i}"), "s", format!("t{i}")).with_branch(format!("b{i}"), None));
                    }
                }

                let endpoints = EndpointExtractor::default().extract(&nodes, &edges, Some(&registry));
                for i in 0..declared {
                    if matched[i] {
                        let id = VirtualEndpoint::endpoint_id("s", &format!("b{i}"));
                        prop_assert!(endpoints.iter().all(|e| e.id() != id));
                    }
                }
            }
        }
    }
}
