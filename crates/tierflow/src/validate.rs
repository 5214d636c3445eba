//! Connectivity validation.
//!
//! The layout engine tolerates cycles but lays them out poorly. Editors run
//! [`detect_cycles`] before saving or laying out so they can tell the user
//! which connections close a loop.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};
use petgraph::{
    Direction,
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use serde::Serialize;

use tierflow_core::{
    model::{Edge, GraphNode},
    node::NodeLike,
};

use crate::LayoutError;

/// How disruptive a cycle is, judged by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleSeverity {
    High,
    Medium,
    Low,
}

impl CycleSeverity {
    /// Short loops are the most likely to be mistakes.
    fn for_length(length: usize) -> Self {
        match length {
            0..=2 => Self::High,
            3..=4 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// One directed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    /// Node ids along the cycle; the first id is repeated at the end
    pub path: Vec<String>,
    pub severity: CycleSeverity,
}

impl Cycle {
    /// Number of distinct nodes on the cycle
    pub fn len(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`detect_cycles`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub has_cycles: bool,
    pub cycles: Vec<Cycle>,
    /// Every node that lies on some cycle, in graph order
    pub affected_nodes: Vec<String>,
}

impl CycleReport {
    /// Turns the first cycle into an error.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::CycleDetected`] if any cycle was found.
    pub fn ensure_acyclic(&self) -> Result<(), LayoutError> {
        match self.cycles.first() {
            Some(cycle) => Err(LayoutError::CycleDetected {
                path: cycle.path.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Finds one representative cycle per strongly connected component.
///
/// Edges referencing unknown nodes are ignored. Each reported cycle starts at
/// the component's earliest node and is the shortest cycle through it.
pub fn detect_cycles(nodes: &[GraphNode], edges: &[Edge]) -> CycleReport {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes {
        indices
            .entry(node.id())
            .or_insert_with(|| graph.add_node(node.id()));
    }
    for edge in edges {
        if let (Some(&source), Some(&target)) = (indices.get(edge.source()), indices.get(edge.target())) {
            graph.update_edge(source, target, ());
        }
    }

    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.contains_edge(*single, *single),
            _ => true,
        })
        .map(|mut component| {
            component.sort();
            component
        })
        .collect();
    components.sort();

    let mut report = CycleReport::default();
    let mut affected: Vec<NodeIndex> = Vec::new();
    for component in &components {
        affected.extend(component.iter().copied());
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        if let Some(path) = shortest_cycle(&graph, component[0], &members) {
            let length = path.len().saturating_sub(1);
            report.cycles.push(Cycle {
                path: path.into_iter().map(|idx| graph[idx].to_string()).collect(),
                severity: CycleSeverity::for_length(length),
            });
        }
    }
    affected.sort();
    report.affected_nodes = affected.into_iter().map(|idx| graph[idx].to_string()).collect();
    report.has_cycles = !report.cycles.is_empty();

    if report.has_cycles {
        warn!(
            cycles = report.cycles.len(),
            affected = report.affected_nodes.len();
            "Graph contains cycles"
        );
    } else {
        debug!(nodes = graph.node_count(); "Graph is acyclic");
    }
    report
}

/// Breadth-first search for the shortest path from `start` back to itself
/// that stays inside `members`. The returned path repeats `start` at the end.
fn shortest_cycle(
    graph: &DiGraph<&str, ()>,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
) -> Option<Vec<NodeIndex>> {
    let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        let mut next: Vec<NodeIndex> = graph
            .neighbors_directed(current, Direction::Outgoing)
            .filter(|n| members.contains(n))
            .collect();
        next.sort();

        for neighbor in next {
            if neighbor == start {
                let mut chain = Vec::new();
                let mut cursor = current;
                while cursor != start {
                    chain.push(cursor);
                    cursor = *previous.get(&cursor)?;
                }
                chain.reverse();

                let mut path = Vec::with_capacity(chain.len() + 2);
                path.push(start);
                path.extend(chain);
                path.push(start);
                return Some(path);
            }
            if !previous.contains_key(&neighbor) {
                previous.insert(neighbor, current);
                queue.push_back(neighbor);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use tierflow_core::{
        geometry::{Point, Size},
        node::NodeKind,
    };

    use super::*;

    fn nodes(ids: &[&str]) -> Vec<GraphNode> {
        ids.iter()
            .map(|id| GraphNode::new(*id, NodeKind::Action, Point::default(), Size::new(120.0, 40.0)))
            .collect()
    }

    fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (s, t))| Edge::new(format!("e{i}"), *s, *t))
            .collect()
    }

    #[test]
    fn test_acyclic_graph() {
        let report = detect_cycles(
            &nodes(&["start", "a", "end"]),
            &edges(&[("start", "a"), ("a", "end")]),
        );
        assert!(!report.has_cycles);
        assert!(report.ensure_acyclic().is_ok());
    }

    #[test]
    fn test_three_node_cycle() {
        let report = detect_cycles(
            &nodes(&["A", "B", "C"]),
            &edges(&[("A", "B"), ("B", "C"), ("C", "A")]),
        );

        assert!(report.has_cycles);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].path, ["A", "B", "C", "A"]);
        assert_eq!(report.cycles[0].severity, CycleSeverity::Medium);
        assert_eq!(report.affected_nodes, ["A", "B", "C"]);

        let err = report.ensure_acyclic().unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected: A -> B -> C -> A");
    }

    #[test]
    fn test_self_loop_and_pair() {
        let report = detect_cycles(
            &nodes(&["a", "b", "c", "d"]),
            &edges(&[("a", "a"), ("b", "c"), ("c", "b"), ("c", "d")]),
        );

        assert_eq!(report.cycles.len(), 2);
        assert_eq!(report.cycles[0].path, ["a", "a"]);
        assert_eq!(report.cycles[1].path, ["b", "c", "b"]);
        assert!(report.cycles.iter().all(|c| c.severity == CycleSeverity::High));
        assert_eq!(report.affected_nodes, ["a", "b", "c"]);
    }

    #[test]
    fn test_long_cycle_is_low_severity() {
        let report = detect_cycles(
            &nodes(&["a", "b", "c", "d", "e"]),
            &edges(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e"), ("e", "a")]),
        );
        assert_eq!(report.cycles[0].len(), 5);
        assert_eq!(report.cycles[0].severity, CycleSeverity::Low);
    }

    #[test]
    fn test_shortest_cycle_through_start() {
        let report = detect_cycles(
            &nodes(&["a", "b", "c", "d"]),
            &edges(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a"), ("b", "a")]),
        );
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].path, ["a", "b", "a"]);
        assert_eq!(report.affected_nodes.len(), 4);
    }

    #[test]
    fn test_unknown_endpoints_ignored() {
        let report = detect_cycles(&nodes(&["a"]), &edges(&[("a", "ghost"), ("ghost", "a")]));
        assert!(!report.has_cycles);
    }
}
