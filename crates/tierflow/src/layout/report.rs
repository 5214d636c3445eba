//! Layout results and run reports.
//!
//! [`LayoutResult`] is the pure output of the pipeline. [`LayoutReport`] wraps
//! it with the outcome of one engine run and is what callers always receive.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use tierflow_core::{
    geometry::Point,
    node::{NodeKind, NodeLike},
};

use super::{Hierarchy, NodeTable, Positions, optimize::OptimizeOutcome};
use crate::LayoutError;

/// Final placement of one node or endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePlacement {
    /// Center x
    pub x: f64,
    /// Center y
    pub y: f64,
    /// Top-left x
    pub left: f64,
    /// Top-left y
    pub top: f64,
    pub layer: usize,
    pub kind: NodeKind,
    /// Source node of a virtual endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Branch of a virtual endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
}

impl NodePlacement {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// True for virtual endpoint placements
    pub fn is_endpoint(&self) -> bool {
        self.source_id.is_some()
    }
}

/// Node counts of one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerStatistics {
    pub index: usize,
    pub nodes: usize,
    pub endpoints: usize,
}

/// Summary of a computed layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutStatistics {
    pub layer_count: usize,
    pub total_nodes: usize,
    pub normal_nodes: usize,
    pub endpoint_nodes: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub layers: Vec<LayerStatistics>,
    /// Nodes the layering could not reach and appended defensively
    pub leftover_nodes: usize,
    /// True if the layer cap cut the layering short
    pub truncated: bool,
    /// Nodes whose coordinates were corrupt and left untouched
    pub anomalies: Vec<String>,
    pub fallback_applied: bool,
    /// Wall time of the run, filled in by the engine
    pub duration_ms: f64,
}

/// Positions and statistics of a layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    pub positions: IndexMap<String, NodePlacement>,
    pub statistics: LayoutStatistics,
}

impl LayoutResult {
    pub fn position(&self, id: &str) -> Option<&NodePlacement> {
        self.positions.get(id)
    }

    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).map(|placement| placement.layer)
    }

    /// Ids of each layer, root-most first, in ascending x
    pub fn layers(&self) -> Vec<Vec<&str>> {
        let mut layers: Vec<Vec<(&str, f64)>> = vec![Vec::new(); self.statistics.layer_count];
        for (id, placement) in &self.positions {
            if let Some(layer) = layers.get_mut(placement.layer) {
                layer.push((id.as_str(), placement.x));
            }
        }
        layers
            .into_iter()
            .map(|mut layer| {
                layer.sort_by(|a, b| a.1.total_cmp(&b.1));
                layer.into_iter().map(|(id, _)| id).collect()
            })
            .collect()
    }
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutReport {
    pub success: bool,
    pub skipped: bool,
    pub from_cache: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<LayoutResult>,
}

impl LayoutReport {
    pub fn completed(result: LayoutResult, from_cache: bool) -> Self {
        let message = format!(
            "Laid out {} node(s) in {} layer(s)",
            result.statistics.total_nodes, result.statistics.layer_count
        );
        Self {
            success: true,
            skipped: false,
            from_cache,
            message,
            error: None,
            result: Some(result),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failed(error: &LayoutError) -> Self {
        Self {
            success: false,
            skipped: false,
            message: format!("Layout failed: {}", error.kind()),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

pub(super) fn build_result(
    table: &NodeTable<'_>,
    hierarchy: &Hierarchy,
    positions: &Positions,
    outcome: &OptimizeOutcome,
) -> LayoutResult {
    let mut placements = IndexMap::new();
    let mut statistics = LayoutStatistics {
        layer_count: hierarchy.layers().len(),
        leftover_nodes: hierarchy.leftovers().len(),
        truncated: hierarchy.is_truncated(),
        anomalies: outcome.anomalies.clone(),
        fallback_applied: outcome.fallback_applied,
        ..LayoutStatistics::default()
    };

    for (index, layer) in hierarchy.layers().iter().enumerate() {
        let mut layer_stats = LayerStatistics {
            index,
            ..LayerStatistics::default()
        };
        for id in layer {
            let (Some(node), Some(center)) = (table.get(id), positions.get(id)) else {
                continue;
            };
            let top_left = center.sub_point(node.size().half());
            let endpoint = node.is_virtual();
            let (source_id, branch_id) = node
                .endpoint_origin()
                .map(|(source, branch)| (Some(source.to_string()), Some(branch.to_string())))
                .unwrap_or_default();

            if endpoint {
                layer_stats.endpoints += 1;
            } else {
                layer_stats.nodes += 1;
                *statistics
                    .nodes_by_kind
                    .entry(node.kind().as_str().to_string())
                    .or_default() += 1;
            }

            placements.insert(
                id.clone(),
                NodePlacement {
                    x: center.x(),
                    y: center.y(),
                    left: top_left.x(),
                    top: top_left.y(),
                    layer: index,
                    kind: node.kind(),
                    source_id,
                    branch_id,
                },
            );
        }
        statistics.normal_nodes += layer_stats.nodes;
        statistics.endpoint_nodes += layer_stats.endpoints;
        statistics.layers.push(layer_stats);
    }
    statistics.total_nodes = statistics.normal_nodes + statistics.endpoint_nodes;

    LayoutResult {
        positions: placements,
        statistics,
    }
}
