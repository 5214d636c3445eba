//! Whole-diagram placement.
//!
//! Centers the diagram horizontally and pins its top edge to `y = 0`.
//! Positions that are not finite or exceed the coordinate limit are treated
//! as corrupt: they take no part in the bounds and are never moved.

use log::{debug, warn};

use tierflow_core::geometry::{Bounds, Point};

use super::{Hierarchy, Positions};
use crate::config::LayoutConfig;

/// Drift below which a single-node layer snaps back to `x = 0`.
const SINGLE_NODE_SNAP: f64 = 1.0;

/// What the optimizer did to a set of positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct OptimizeOutcome {
    /// Translation applied to every valid position.
    pub offset: Point,
    /// True if the span was implausible and the clamped offset was used.
    pub fallback_applied: bool,
    /// Ids whose coordinates were corrupt.
    pub anomalies: Vec<String>,
}

/// Translates `positions` in place.
pub(super) fn optimize(hierarchy: &Hierarchy, positions: &mut Positions, config: &LayoutConfig) -> OptimizeOutcome {
    let limit = config.coordinate_limit();
    let mut outcome = OptimizeOutcome::default();

    for (id, position) in positions.iter() {
        if !position.is_within(limit) {
            warn!(node_id = id, x = position.x(), y = position.y(); "Ignoring corrupt coordinate");
            outcome.anomalies.push(id.clone());
        }
    }

    let Some(bounds) = Bounds::from_points(
        positions
            .values()
            .copied()
            .filter(|position| position.is_within(limit)),
    ) else {
        return outcome;
    };

    let center = bounds.center();
    outcome.offset = if bounds.width() > config.anomalous_span() {
        let max_shift = config.fallback_max_shift();
        warn!(
            span = bounds.width(),
            max_shift;
            "Diagram span is implausible, using clamped translation"
        );
        outcome.fallback_applied = true;
        Point::new((-center.x()).clamp(-max_shift, max_shift), 0.0)
    } else {
        Point::new(-center.x(), -bounds.min_y())
    };

    for position in positions.values_mut() {
        if position.is_within(limit) {
            *position = position.add_point(outcome.offset);
        }
    }

    for layer in hierarchy.layers() {
        let [only] = layer.as_slice() else {
            continue;
        };
        if let Some(position) = positions.get_mut(only) {
            if position.x().abs() < SINGLE_NODE_SNAP {
                *position = position.with_x(0.0);
            }
        }
    }

    debug!(
        dx = outcome.offset.x(),
        dy = outcome.offset.y(),
        anomalies = outcome.anomalies.len();
        "Diagram positioned"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use tierflow_core::{
        geometry::Size,
        model::GraphNode,
        node::NodeKind,
    };

    use super::*;
    use crate::layout::NodeTable;

    fn positions(entries: &[(&str, f64, f64)]) -> Positions {
        entries
            .iter()
            .map(|&(id, x, y)| (id.to_string(), Point::new(x, y)))
            .collect()
    }

    fn empty_hierarchy() -> Hierarchy {
        Hierarchy::default()
    }

    #[test]
    fn test_centers_and_pins_top() {
        let mut positions = positions(&[("a", 100.0, 300.0), ("b", 300.0, 500.0)]);
        let outcome = optimize(&empty_hierarchy(), &mut positions, &LayoutConfig::default());

        assert!(!outcome.fallback_applied);
        assert_eq!(positions["a"], Point::new(-100.0, 0.0));
        assert_eq!(positions["b"], Point::new(100.0, 200.0));
    }

    #[test]
    fn test_corrupt_coordinates_are_excluded() {
        let mut positions = positions(&[
            ("a", -50.0, 0.0),
            ("b", 150.0, 200.0),
            ("far", 1e9, 0.0),
            ("nan", f64::NAN, 0.0),
        ]);
        let outcome = optimize(&empty_hierarchy(), &mut positions, &LayoutConfig::default());

        assert_eq!(outcome.anomalies, ["far", "nan"]);
        assert_eq!(positions["a"], Point::new(-100.0, 0.0));
        assert_approx_eq!(f64, positions["far"].x(), 1e9);
        assert!(positions["nan"].x().is_nan());
    }

    #[test]
    fn test_large_span_uses_clamped_offset() {
        let mut positions = positions(&[("a", 1000.0, 100.0), ("b", 3000.0, 100.0)]);
        let outcome = optimize(&empty_hierarchy(), &mut positions, &LayoutConfig::default());

        assert!(outcome.fallback_applied);
        assert_eq!(outcome.offset, Point::new(-200.0, 0.0));
        assert_eq!(positions["a"], Point::new(800.0, 100.0));
    }

    #[test]
    fn test_single_node_layer_resnaps() {
        let nodes = vec![
            GraphNode::new("a", NodeKind::Start, Point::default(), Size::new(120.0, 40.0)),
            GraphNode::new("b", NodeKind::End, Point::default(), Size::new(120.0, 40.0)),
            GraphNode::new("c", NodeKind::End, Point::default(), Size::new(120.0, 40.0)),
        ];
        let table = NodeTable::new(&nodes, &[]);
        let hierarchy = Hierarchy::build(&table, &[], &[], 20);
        // a alone in layer 0; b and c in layer 1, slightly off center
        let mut positions = positions(&[("a", 0.0, 0.0), ("b", -59.6, 200.0), ("c", 60.0, 200.0)]);

        optimize(&hierarchy, &mut positions, &LayoutConfig::default());
        assert_eq!(positions["a"].x(), 0.0);
        assert_approx_eq!(f64, positions["b"].x(), -59.8, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_positions() {
        let mut positions = Positions::new();
        let outcome = optimize(&empty_hierarchy(), &mut positions, &LayoutConfig::default());
        assert_eq!(outcome, OptimizeOutcome::default());
    }
}
