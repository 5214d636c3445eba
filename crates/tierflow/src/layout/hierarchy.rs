//! Parent/child relations and layer assignment.
//!
//! Layers are built bottom-up: leaves first, then every parent whose real
//! children have all been placed. Once the sweep ends the order is reversed
//! so index 0 is the root-most layer. Virtual endpoints take no part in the
//! sweep; each one is inserted one layer below its source afterwards.
//!
//! Nodes the sweep never reaches (cycles, or anything cut off by the layer
//! cap) are appended to the root-most layer instead of being dropped.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, warn};

use tierflow_core::{
    model::Edge,
    node::{NodeKind, NodeLike, VirtualEndpoint},
};

use super::NodeTable;

/// Adjacency and layering of one layout run.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    children: IndexMap<String, Vec<String>>,
    parents: IndexMap<String, Vec<String>>,
    virtual_ids: HashSet<String>,
    layers: Vec<Vec<String>>,
    node_to_layer: HashMap<String, usize>,
    leftovers: Vec<String>,
    truncated: bool,
}

impl Hierarchy {
    /// Builds adjacency over real edges plus one synthetic edge per endpoint,
    /// then assigns layers.
    pub fn build(
        table: &NodeTable<'_>,
        edges: &[Edge],
        endpoints: &[VirtualEndpoint],
        max_layers: usize,
    ) -> Self {
        let mut hierarchy = Self::default();
        for node in table.iter() {
            hierarchy.children.insert(node.id().to_string(), Vec::new());
            hierarchy.parents.insert(node.id().to_string(), Vec::new());
            if node.is_virtual() {
                hierarchy.virtual_ids.insert(node.id().to_string());
            }
        }

        let mut real_edges = 0;
        for edge in edges {
            if table.is_virtual(edge.source()) || table.is_virtual(edge.target()) {
                continue;
            }
            if hierarchy.link(edge.source(), edge.target()) {
                real_edges += 1;
            }
        }
        for endpoint in endpoints {
            hierarchy.link(endpoint.source_id(), endpoint.id());
        }

        if real_edges == 0 {
            hierarchy.build_type_layers(table);
        } else {
            let leaves = hierarchy.identify_leaves(table);
            hierarchy.sweep(table, leaves, max_layers.max(1));
        }
        hierarchy.place_endpoints(endpoints);
        hierarchy.reindex();

        hierarchy
    }

    /// Records `parent -> child`. Returns false if either side is unknown or the link exists.
    fn link(&mut self, parent: &str, child: &str) -> bool {
        if !self.parents.contains_key(child) {
            return false;
        }
        let Some(children) = self.children.get_mut(parent) else {
            return false;
        };
        if children.iter().any(|c| c == child) {
            return false;
        }
        children.push(child.to_string());
        if let Some(parents) = self.parents.get_mut(child) {
            parents.push(parent.to_string());
        }
        true
    }

    /// All children of `id`, synthetic endpoint children included
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// All parents of `id`
    pub fn parents(&self, id: &str) -> &[String] {
        self.parents.get(id).map_or(&[], Vec::as_slice)
    }

    /// Children of `id` that are real graph nodes
    pub fn real_children(&self, id: &str) -> impl Iterator<Item = &str> + '_ {
        self.children(id)
            .iter()
            .filter(|child| !self.virtual_ids.contains(child.as_str()))
            .map(String::as_str)
    }

    /// Layers from the root-most (index 0) to the deepest
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Layer index of a node
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.node_to_layer.get(id).copied()
    }

    pub fn is_virtual(&self, id: &str) -> bool {
        self.virtual_ids.contains(id)
    }

    /// Nodes the sweep could not place on its own
    pub fn leftovers(&self) -> &[String] {
        &self.leftovers
    }

    /// True when the layer cap stopped the sweep early
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn real_parents(&self, id: &str) -> impl Iterator<Item = &str> + '_ {
        self.parents(id)
            .iter()
            .filter(|parent| !self.virtual_ids.contains(parent.as_str()))
            .map(String::as_str)
    }

    /// Starting set of the bottom-up sweep.
    fn identify_leaves(&self, table: &NodeTable<'_>) -> Vec<String> {
        let real: Vec<&str> = table.real_ids().collect();
        let leaves: Vec<&str> = real
            .iter()
            .copied()
            .filter(|id| self.real_children(id).next().is_none())
            .collect();

        if leaves.is_empty() || leaves.len() == real.len() {
            let ends = real_of_kind(table, &real, |kind| kind == NodeKind::End);
            if !ends.is_empty() {
                debug!(count = ends.len(); "Using end nodes as leaves");
                return ends;
            }
            let non_start = real_of_kind(table, &real, |kind| kind != NodeKind::Start);
            if !non_start.is_empty() {
                debug!(count = non_start.len(); "Using non-start nodes as leaves");
                return non_start;
            }
        }

        if leaves.is_empty() {
            let roots: Vec<String> = real
                .iter()
                .filter(|id| self.real_parents(id).next().is_none())
                .map(|id| id.to_string())
                .collect();
            if !roots.is_empty() {
                warn!(count = roots.len(); "No leaves found, starting from roots");
                return roots;
            }
            warn!("No leaves or roots found, starting from the first node");
            return real.first().map(|id| vec![id.to_string()]).unwrap_or_default();
        }

        leaves.into_iter().map(str::to_string).collect()
    }

    /// Bottom-up breadth-first layering. Produces root-most-first layers.
    fn sweep(&mut self, table: &NodeTable<'_>, leaves: Vec<String>, max_layers: usize) {
        let mut processed: HashSet<String> = HashSet::new();
        let mut bottom_up: Vec<Vec<String>> = Vec::new();
        let mut current = leaves;

        while !current.is_empty() {
            if bottom_up.len() >= max_layers {
                warn!(max_layers, pending = current.len(); "Layer cap reached, stopping sweep");
                self.truncated = true;
                break;
            }

            processed.extend(current.iter().cloned());

            let mut next: Vec<String> = Vec::new();
            for id in &current {
                for parent in self.real_parents(id) {
                    if processed.contains(parent) || next.iter().any(|n| n == parent) {
                        continue;
                    }
                    let ready = self
                        .real_children(parent)
                        .all(|child| processed.contains(child));
                    if ready {
                        next.push(parent.to_string());
                    }
                }
            }

            bottom_up.push(current);
            current = next;
        }

        let leftovers: Vec<String> = table
            .real_ids()
            .filter(|id| !processed.contains(*id))
            .map(str::to_string)
            .collect();
        if !leftovers.is_empty() {
            warn!(count = leftovers.len(); "Appending unreached nodes to the root-most layer");
            if bottom_up.is_empty() {
                bottom_up.push(Vec::new());
            }
            if let Some(top) = bottom_up.last_mut() {
                top.extend(leftovers.iter().cloned());
            }
            self.leftovers = leftovers;
        }

        bottom_up.reverse();
        self.layers = bottom_up;
    }

    /// Layering used when the graph has no real edges: start, others, end.
    fn build_type_layers(&mut self, table: &NodeTable<'_>) {
        let real: Vec<&str> = table.real_ids().collect();
        let groups = [
            real_of_kind(table, &real, |kind| kind == NodeKind::Start),
            real_of_kind(table, &real, |kind| {
                kind != NodeKind::Start && kind != NodeKind::End
            }),
            real_of_kind(table, &real, |kind| kind == NodeKind::End),
        ];
        self.layers = groups.into_iter().filter(|g| !g.is_empty()).collect();
        debug!(layers = self.layers.len(); "No real edges, using type-based layers");
    }

    /// Puts each endpoint one layer below its source.
    fn place_endpoints(&mut self, endpoints: &[VirtualEndpoint]) {
        let source_layers: HashMap<&str, usize> = self
            .layers
            .iter()
            .enumerate()
            .flat_map(|(index, layer)| layer.iter().map(move |id| (id.as_str(), index)))
            .collect();

        let placements: Vec<(String, Option<usize>)> = endpoints
            .iter()
            .map(|endpoint| {
                let target = source_layers
                    .get(endpoint.source_id())
                    .map(|&index| index + 1);
                (endpoint.id().to_string(), target)
            })
            .collect();

        for (id, target) in placements {
            match target {
                Some(index) => {
                    while self.layers.len() <= index {
                        self.layers.push(Vec::new());
                    }
                    self.layers[index].push(id);
                }
                None => {
                    warn!(endpoint_id = id; "Endpoint source has no layer, using the last layer");
                    if self.layers.is_empty() {
                        self.layers.push(Vec::new());
                    }
                    if let Some(last) = self.layers.last_mut() {
                        last.push(id);
                    }
                }
            }
        }
    }

    fn reindex(&mut self) {
        self.layers.retain(|layer| !layer.is_empty());
        self.node_to_layer = self
            .layers
            .iter()
            .enumerate()
            .flat_map(|(index, layer)| layer.iter().map(move |id| (id.clone(), index)))
            .collect();
    }
}

fn real_of_kind(table: &NodeTable<'_>, real: &[&str], keep: impl Fn(NodeKind) -> bool) -> Vec<String> {
    real.iter()
        .filter(|id| table.kind(id).is_some_and(&keep))
        .map(|id| id.to_string())
        .collect()
}
