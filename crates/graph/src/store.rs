use std::collections::{BTreeMap, HashMap};

use netjobs_core::GraphPayload;
use serde::Serialize;

/// Dense vertex index, assigned in insertion order.
pub type VertexId = usize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphStats {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub total_weight: f64,
    pub isolated_count: usize,
}

/// Weighted undirected graph over named vertices.
///
/// Parallel edges are merged by summing their weights. The adjacency entry
/// of a self-loop holds twice its weight so that `strength(v)` is always
/// the row sum of the adjacency matrix.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    names: Vec<String>,
    key_index: HashMap<String, VertexId>,
    adjacency: Vec<BTreeMap<VertexId, f64>>,
    edge_count: usize,
    total_weight: f64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a validated submission payload.
    pub fn from_payload(payload: &GraphPayload) -> Self {
        let mut g = Self::new();
        for name in &payload.nodes {
            g.upsert_vertex(name);
        }
        for edge in &payload.edges {
            let a = g.upsert_vertex(&edge.source);
            let b = g.upsert_vertex(&edge.target);
            g.add_edge(a, b, edge.weight);
        }
        g
    }

    pub fn upsert_vertex(&mut self, name: &str) -> VertexId {
        if let Some(&existing) = self.key_index.get(name) {
            return existing;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.key_index.insert(name.to_string(), id);
        self.adjacency.push(BTreeMap::new());
        id
    }

    /// Add (or reinforce) an undirected edge.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId, weight: f64) {
        let existed = self.adjacency[a].contains_key(&b);
        if a == b {
            *self.adjacency[a].entry(a).or_insert(0.0) += 2.0 * weight;
        } else {
            *self.adjacency[a].entry(b).or_insert(0.0) += weight;
            *self.adjacency[b].entry(a).or_insert(0.0) += weight;
        }
        if !existed {
            self.edge_count += 1;
        }
        self.total_weight += weight;
    }

    pub fn vertex_count(&self) -> usize {
        self.names.len()
    }

    /// Number of distinct vertex pairs joined by at least one edge.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Sum of all edge weights (`m` in modularity formulas).
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn name(&self, id: VertexId) -> &str {
        &self.names[id]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn vertex_id(&self, name: &str) -> Option<VertexId> {
        self.key_index.get(name).copied()
    }

    /// Neighbors with merged weights, ascending by id. Includes `id` itself
    /// when the vertex has a self-loop.
    pub fn neighbors(&self, id: VertexId) -> impl Iterator<Item = (VertexId, f64)> + '_ {
        self.adjacency[id].iter().map(|(&n, &w)| (n, w))
    }

    /// Weighted degree.
    pub fn strength(&self, id: VertexId) -> f64 {
        self.adjacency[id].values().sum()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            vertex_count: self.vertex_count(),
            edge_count: self.edge_count,
            total_weight: self.total_weight,
            isolated_count: self.adjacency.iter().filter(|a| a.is_empty()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netjobs_core::WeightedEdge;

    fn edge(a: &str, b: &str, w: f64) -> WeightedEdge {
        WeightedEdge {
            source: a.to_string(),
            target: b.to_string(),
            weight: w,
        }
    }

    #[test]
    fn builds_from_payload() {
        let payload = GraphPayload {
            nodes: vec!["solo".to_string()],
            edges: vec![edge("a", "b", 1.0), edge("b", "c", 2.0)],
        };
        let g = GraphStore::from_payload(&payload);

        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.total_weight(), 3.0);
        assert_eq!(g.name(0), "solo");

        let b = g.vertex_id("b").unwrap();
        assert_eq!(g.strength(b), 3.0);
        assert_eq!(g.stats().isolated_count, 1);
    }

    #[test]
    fn parallel_edges_merge() {
        let mut g = GraphStore::new();
        let a = g.upsert_vertex("a");
        let b = g.upsert_vertex("b");
        g.add_edge(a, b, 1.0);
        g.add_edge(b, a, 2.5);

        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.neighbors(a).collect::<Vec<_>>(), vec![(b, 3.5)]);
        assert_eq!(g.neighbors(b).collect::<Vec<_>>(), vec![(a, 3.5)]);
    }

    #[test]
    fn self_loop_counts_twice_in_strength() {
        let mut g = GraphStore::new();
        let a = g.upsert_vertex("a");
        g.add_edge(a, a, 1.0);

        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.total_weight(), 1.0);
        assert_eq!(g.strength(a), 2.0);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut g = GraphStore::new();
        let first = g.upsert_vertex("x");
        let second = g.upsert_vertex("x");
        assert_eq!(first, second);
        assert_eq!(g.vertex_count(), 1);
    }

    #[test]
    fn strengths_sum_to_twice_total_weight() {
        let payload = GraphPayload {
            nodes: vec![],
            edges: vec![
                edge("a", "b", 1.0),
                edge("b", "c", 0.5),
                edge("c", "c", 2.0),
                edge("a", "c", 1.5),
            ],
        };
        let g = GraphStore::from_payload(&payload);
        let sum: f64 = (0..g.vertex_count()).map(|v| g.strength(v)).sum();
        assert!((sum - 2.0 * g.total_weight()).abs() < 1e-12);
    }
}
