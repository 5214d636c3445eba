//! Hierarchical layout pipeline.
//!
//! A run flows one way through the stages below. Every stage works on
//! center-based logical coordinates; conversion to top-left corners happens
//! only when the result is built.
//!
//! # Overview
//!
//! - [`preprocess`] - Drops drag hints, preview nodes and preview edges.
//! - [`EndpointExtractor`] - Materializes placeholders for unconnected branches.
//! - [`Hierarchy`] - Parent/child maps and the bottom-up layering.
//! - `solver` - Initial coordinates, deepest layer first.
//! - `align` - Overlap resolution, re-centering and symmetric snapping per layer.
//! - `optimize` - Whole-diagram centering with corrupt-coordinate filtering.
//! - `apply` / [`LayoutReport`] - Write-back and statistics.

mod align;
mod apply;
mod endpoints;
mod hierarchy;
mod optimize;
mod preprocess;
mod report;
mod solver;

pub use endpoints::{EndpointExtractor, GENERIC_BRANCH_ID, SINGLE_BRANCH_ID};
pub use hierarchy::Hierarchy;
pub use preprocess::{Preprocessed, preprocess};
pub use report::{LayerStatistics, LayoutReport, LayoutResult, LayoutStatistics, NodePlacement};

pub(crate) use apply::{ApplyStats, apply_positions};

use indexmap::IndexMap;
use log::debug;

use tierflow_core::{
    geometry::Point,
    model::{Edge, GraphNode},
    node::{NodeKind, NodeLike, VirtualEndpoint},
};

use crate::config::LayoutConfig;

/// Center positions keyed by node id, in insertion order.
pub(crate) type Positions = IndexMap<String, Point>;

/// Uniform view over real nodes and virtual endpoints for one run.
pub struct NodeTable<'a> {
    entries: IndexMap<&'a str, &'a dyn NodeLike>,
}

impl<'a> NodeTable<'a> {
    /// Indexes real nodes first, then endpoints. Duplicate ids keep the first entry.
    pub fn new(nodes: &'a [GraphNode], endpoints: &'a [VirtualEndpoint]) -> Self {
        let mut entries: IndexMap<&'a str, &'a dyn NodeLike> = IndexMap::new();
        let all = nodes
            .iter()
            .map(|node| node as &dyn NodeLike)
            .chain(endpoints.iter().map(|endpoint| endpoint as &dyn NodeLike));
        for node in all {
            entries.entry(node.id()).or_insert(node);
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&'a dyn NodeLike> {
        self.entries.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// True if `id` names a virtual endpoint
    pub fn is_virtual(&self, id: &str) -> bool {
        self.get(id).is_some_and(|node| node.is_virtual())
    }

    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.get(id).map(|node| node.kind())
    }

    /// Insertion rank, used as a stable tie-breaker
    pub fn rank(&self, id: &str) -> usize {
        self.entries.get_index_of(id).unwrap_or(usize::MAX)
    }

    /// Pre-layout horizontal center of a node
    pub fn initial_x(&self, id: &str) -> f64 {
        self.get(id).map_or(0.0, |node| node.center().x())
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a dyn NodeLike> + '_ {
        self.entries.values().copied()
    }

    /// Ids of real (non-virtual) nodes in insertion order
    pub fn real_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.entries
            .iter()
            .filter(|(_, node)| !node.is_virtual())
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs the pure stages of the pipeline: hierarchy, solving, alignment and
/// global optimization.
///
/// # Arguments
///
/// * `nodes` - Preprocessed real nodes
/// * `edges` - Preprocessed real edges
/// * `endpoints` - Virtual endpoints for open branches
/// * `config` - Layout tunables
pub fn compute_layout(
    nodes: &[GraphNode],
    edges: &[Edge],
    endpoints: &[VirtualEndpoint],
    config: &LayoutConfig,
) -> LayoutResult {
    let table = NodeTable::new(nodes, endpoints);

    let hierarchy = Hierarchy::build(&table, edges, endpoints, config.max_layers());
    debug!(
        layers = hierarchy.layers().len(),
        leftovers = hierarchy.leftovers().len(),
        truncated = hierarchy.is_truncated();
        "Hierarchy built"
    );

    let mut positions = solver::solve(&table, &hierarchy, config);
    align::align_layers(&table, &hierarchy, &mut positions, config);
    let outcome = optimize::optimize(&hierarchy, &mut positions, config);

    report::build_result(&table, &hierarchy, &positions, &outcome)
}

/// Sorts ids by a coordinate, breaking ties by insertion rank.
pub(crate) fn sort_by_coordinate(ids: &mut [String], table: &NodeTable<'_>, x_of: impl Fn(&str) -> f64) {
    ids.sort_by(|a, b| {
        x_of(a.as_str())
            .total_cmp(&x_of(b.as_str()))
            .then_with(|| table.rank(a).cmp(&table.rank(b)))
    });
}
