//! Initial coordinate assignment.
//!
//! Works from the deepest layer upwards so every parent sees its children's
//! coordinates. All positions are node centers.

use log::trace;

use tierflow_core::geometry::Point;

use super::{Hierarchy, NodeTable, Positions, sort_by_coordinate};
use crate::config::LayoutConfig;

/// Weight of the children's mean when placing a parent; the rest goes to the
/// midpoint of the children's extent.
const MEAN_WEIGHT: f64 = 0.7;

/// Computes an initial center for every node in `hierarchy`.
pub(super) fn solve(table: &NodeTable<'_>, hierarchy: &Hierarchy, config: &LayoutConfig) -> Positions {
    let mut positions = Positions::new();
    let layers = hierarchy.layers();
    let Some(deepest) = layers.len().checked_sub(1) else {
        return positions;
    };

    let spacing = config.preferred_spacing();
    for (index, layer) in layers.iter().enumerate().rev() {
        let y = index as f64 * config.base_height();

        if index == deepest {
            let mut ordered = layer.clone();
            sort_by_coordinate(&mut ordered, table, |id| table.initial_x(id));
            let start = -(ordered.len().saturating_sub(1) as f64) * spacing / 2.0;
            for (slot, id) in ordered.into_iter().enumerate() {
                positions.insert(id, Point::new(start + slot as f64 * spacing, y));
            }
            continue;
        }

        let mut childless = Vec::new();
        let mut rightmost: Option<f64> = None;
        for id in layer {
            let child_xs: Vec<f64> = hierarchy
                .children(id)
                .iter()
                .filter_map(|child| positions.get(child).map(|p| p.x()))
                .collect();
            match weighted_center(&child_xs) {
                Some(x) => {
                    rightmost = Some(rightmost.map_or(x, |r| r.max(x)));
                    positions.insert(id.clone(), Point::new(x, y));
                }
                None => childless.push(id.clone()),
            }
        }

        for id in childless {
            let x = rightmost.map_or(0.0, |r| r + spacing);
            trace!(node_id = id, x; "Placing childless node after rightmost");
            rightmost = Some(x);
            positions.insert(id, Point::new(x, y));
        }
    }

    positions
}

/// Blend of mean and extent midpoint, or `None` for an empty slice.
pub(super) fn weighted_center(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(MEAN_WEIGHT * mean + (1.0 - MEAN_WEIGHT) * (min + max) / 2.0)
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use tierflow_core::{
        geometry::Size,
        model::{Edge, GraphNode},
        node::{NodeKind, NodeLike, VirtualEndpoint},
    };

    use super::*;

    fn node_at(id: &str, x: f64) -> GraphNode {
        GraphNode::new(id, NodeKind::Action, Point::new(x, 0.0), Size::new(120.0, 40.0))
    }

    fn solve_graph(nodes: &[GraphNode], edges: &[Edge], endpoints: &[VirtualEndpoint]) -> Positions {
        let table = NodeTable::new(nodes, endpoints);
        let hierarchy = Hierarchy::build(&table, edges, endpoints, 20);
        solve(&table, &hierarchy, &LayoutConfig::default())
    }

    #[test]
    fn test_weighted_center() {
        assert!(weighted_center(&[]).is_none());
        assert_approx_eq!(f64, weighted_center(&[10.0]).unwrap(), 10.0);
        // mean 100, midpoint 150
        assert_approx_eq!(f64, weighted_center(&[0.0, 0.0, 300.0]).unwrap(), 115.0);
    }

    #[test]
    fn test_bottom_layer_sorted_by_initial_x() {
        let nodes = vec![
            node_at("root", 0.0),
            node_at("right", 500.0),
            node_at("left", -500.0),
        ];
        let edges = vec![Edge::new("e1", "root", "right"), Edge::new("e2", "root", "left")];
        let positions = solve_graph(&nodes, &edges, &[]);

        assert_approx_eq!(f64, positions["left"].x(), -100.0);
        assert_approx_eq!(f64, positions["right"].x(), 100.0);
        assert_approx_eq!(f64, positions["left"].y(), 200.0);
        assert_approx_eq!(f64, positions["root"].x(), 0.0);
        assert_approx_eq!(f64, positions["root"].y(), 0.0);
    }

    #[test]
    fn test_parent_uses_virtual_children() {
        let nodes = vec![node_at("s", 0.0), node_at("a", 0.0)];
        let edges = vec![Edge::new("e1", "s", "a")];
        let endpoints = vec![VirtualEndpoint::new("s", "b2", None, Point::new(900.0, 0.0))];
        let positions = solve_graph(&nodes, &edges, &endpoints);

        // Deepest layer: a at -100, endpoint at 100
        assert_approx_eq!(f64, positions["a"].x(), -100.0);
        assert_approx_eq!(f64, positions["endpoint_s_b2"].x(), 100.0);
        assert_approx_eq!(f64, positions["s"].x(), 0.0);
    }

    #[test]
    fn test_childless_nodes_follow_rightmost() {
        // p <-> q never leave the cycle and join the root layer
        let nodes = vec![
            node_at("start", 0.0),
            node_at("x", 0.0),
            node_at("end", 0.0),
            node_at("p", 0.0),
            node_at("q", 0.0),
        ];
        let edges = vec![
            Edge::new("e1", "start", "x"),
            Edge::new("e2", "x", "end"),
            Edge::new("e3", "p", "q"),
            Edge::new("e4", "q", "p"),
        ];
        let positions = solve_graph(&nodes, &edges, &[]);

        assert_approx_eq!(f64, positions["start"].x(), 0.0);
        assert_approx_eq!(f64, positions["p"].x(), 200.0);
        assert_approx_eq!(f64, positions["q"].x(), 400.0);
        assert_approx_eq!(f64, positions["q"].y(), 0.0);
    }

    #[test]
    fn test_every_node_positioned() {
        let nodes = vec![node_at("start", 0.0), node_at("a", 0.0), node_at("lonely", 0.0)];
        let edges = vec![Edge::new("e1", "start", "a")];
        let positions = solve_graph(&nodes, &edges, &[]);

        assert_eq!(positions.len(), 3);
        for node in &nodes {
            assert!(positions.contains_key(node.id()));
        }
    }
}
