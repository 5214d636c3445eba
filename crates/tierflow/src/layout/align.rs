//! Per-layer alignment.
//!
//! Each layer goes through overlap resolution, parent re-centering and
//! symmetric snapping, deepest layer first so parents are re-centered over
//! children that already reached their final place.

use log::{debug, trace};

use tierflow_core::geometry::Point;

use super::{Hierarchy, NodeTable, Positions, solver::weighted_center, sort_by_coordinate};
use crate::config::LayoutConfig;

/// Largest spacing used for layers of five or more nodes.
const WIDE_LAYER_MAX_SPACING: f64 = 120.0;

/// Width budget split between the gaps of a layer of five or more nodes.
const WIDE_LAYER_SPAN: f64 = 240.0;

/// Tolerance for a layer's bounding-box center around zero.
const CENTER_TOLERANCE: f64 = 0.5;

/// Aligns every layer in place.
pub(super) fn align_layers(
    table: &NodeTable<'_>,
    hierarchy: &Hierarchy,
    positions: &mut Positions,
    config: &LayoutConfig,
) {
    for (index, layer) in hierarchy.layers().iter().enumerate().rev() {
        if layer.is_empty() {
            continue;
        }
        let y = index as f64 * config.base_height();

        resolve_overlaps(table, layer, positions, config.min_spacing());
        recenter_parents(hierarchy, layer, positions, config.recenter_threshold());
        snap_symmetric(table, layer, positions, config.min_spacing());

        for id in layer {
            if let Some(position) = positions.get_mut(id) {
                *position = position.with_y(y);
            }
        }
        trace!(layer = index, nodes = layer.len(); "Layer aligned");
    }
}

fn ordered_by_x(table: &NodeTable<'_>, layer: &[String], positions: &Positions) -> Vec<String> {
    let mut ordered = layer.to_vec();
    sort_by_coordinate(&mut ordered, table, |id| {
        positions.get(id).map_or(0.0, |p| p.x())
    });
    ordered
}

/// Pushes nodes right until adjacent centers are at least `min_spacing` apart.
fn resolve_overlaps(table: &NodeTable<'_>, layer: &[String], positions: &mut Positions, min_spacing: f64) {
    let ordered = ordered_by_x(table, layer, positions);
    let mut previous: Option<f64> = None;
    for id in &ordered {
        let Some(position) = positions.get_mut(id) else {
            continue;
        };
        if let Some(left) = previous {
            let gap = position.x() - left;
            if gap < min_spacing {
                *position = position.with_x(left + min_spacing);
            }
        }
        previous = Some(position.x());
    }
}

/// Moves parents over their children when the move is small.
fn recenter_parents(hierarchy: &Hierarchy, layer: &[String], positions: &mut Positions, threshold: f64) {
    for id in layer {
        let child_xs: Vec<f64> = hierarchy
            .children(id)
            .iter()
            .filter_map(|child| positions.get(child).map(|p| p.x()))
            .collect();
        let Some(ideal) = weighted_center(&child_xs) else {
            continue;
        };
        let Some(position) = positions.get_mut(id) else {
            continue;
        };
        if (ideal - position.x()).abs() <= threshold {
            *position = position.with_x(ideal);
        }
    }
}

/// Symmetric offsets for a layer of `count` nodes, left to right.
pub(super) fn symmetric_pattern(count: usize, min_spacing: f64) -> Vec<f64> {
    let pattern: Vec<f64> = match count {
        0 => return Vec::new(),
        1 => return vec![0.0],
        2 => vec![-60.0, 60.0],
        3 => vec![-80.0, 0.0, 80.0],
        4 => vec![-90.0, -30.0, 30.0, 90.0],
        _ => {
            let spacing = (WIDE_LAYER_MAX_SPACING.min(WIDE_LAYER_SPAN / (count - 1) as f64)).max(min_spacing);
            let start = -spacing * (count - 1) as f64 / 2.0;
            return (0..count).map(|slot| start + slot as f64 * spacing).collect();
        }
    };

    let gap = pattern[1] - pattern[0];
    if gap < min_spacing {
        let factor = min_spacing / gap;
        return pattern.into_iter().map(|x| x * factor).collect();
    }
    pattern
}

/// Replaces a layer's x values with the symmetric pattern, keeping the order.
fn snap_symmetric(table: &NodeTable<'_>, layer: &[String], positions: &mut Positions, min_spacing: f64) {
    let ordered = ordered_by_x(table, layer, positions);
    let pattern = symmetric_pattern(ordered.len(), min_spacing);
    for (id, x) in ordered.iter().zip(pattern) {
        if let Some(position) = positions.get_mut(id) {
            *position = position.with_x(x);
        }
    }

    let xs: Vec<f64> = ordered
        .iter()
        .filter_map(|id| positions.get(id).map(|p| p.x()))
        .collect();
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let center = (min + max) / 2.0;
    if center.is_finite() && center.abs() > CENTER_TOLERANCE {
        debug!(center; "Applying micro-offset to layer");
        for id in &ordered {
            if let Some(position) = positions.get_mut(id) {
                *position = position.sub_point(Point::new(center, 0.0));
            }
        }
    }
}
