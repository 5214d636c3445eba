//! Memoization of computed layouts.
//!
//! A layout depends only on the preprocessed nodes, edges and virtual
//! endpoints. [`GraphFingerprint`] hashes exactly those inputs; [`LayoutCache`]
//! keeps a bounded number of results keyed by it.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use indexmap::IndexMap;
use log::trace;

use tierflow_core::{
    geometry::Point,
    model::{Edge, GraphNode},
    node::{NodeLike, VirtualEndpoint},
};

use crate::layout::LayoutResult;

/// Hash of the inputs of one layout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphFingerprint(u64);

impl GraphFingerprint {
    pub fn compute(nodes: &[GraphNode], edges: &[Edge], endpoints: &[VirtualEndpoint]) -> Self {
        let mut hasher = DefaultHasher::new();

        nodes.len().hash(&mut hasher);
        for node in nodes {
            node.id().hash(&mut hasher);
            node.kind().hash(&mut hasher);
            hash_point(node.position(), &mut hasher);
            hash_point(Point::new(node.size().width(), node.size().height()), &mut hasher);
        }

        edges.len().hash(&mut hasher);
        for edge in edges {
            edge.source().hash(&mut hasher);
            edge.target().hash(&mut hasher);
        }

        endpoints.len().hash(&mut hasher);
        for endpoint in endpoints {
            endpoint.id().hash(&mut hasher);
            hash_point(endpoint.center(), &mut hasher);
        }

        Self(hasher.finish())
    }
}

fn hash_point(point: Point, hasher: &mut impl Hasher) {
    point.x().to_bits().hash(hasher);
    point.y().to_bits().hash(hasher);
}

/// Bounded first-in, first-out store of layout results.
#[derive(Debug, Clone)]
pub struct LayoutCache {
    entries: IndexMap<GraphFingerprint, LayoutResult>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up a result, counting the hit or miss
    pub fn get(&mut self, key: GraphFingerprint) -> Option<&LayoutResult> {
        match self.entries.get(&key) {
            Some(result) => {
                self.hits += 1;
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a result, evicting the oldest entry when full
    pub fn insert(&mut self, key: GraphFingerprint, result: LayoutResult) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                trace!(fingerprint = evicted.0; "Evicted cached layout");
            }
        }
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
