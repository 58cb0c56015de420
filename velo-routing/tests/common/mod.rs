//! Shared helpers for the integration suites

use velo_routing::{Cost, EdgeStore, Graph, Node};

pub fn node(id: u32) -> Node {
    Node {
        id,
        osm_id: 1000 + id as u64,
        lat: 48.7 + id as f64 * 0.01,
        lng: 9.1 + id as f64 * 0.01,
        height: 300.0,
        level: 0,
    }
}

/// Builds a graph from `(source, dest, [length, height, unsuitability])`
/// triples over `node_count` nodes at level zero.
pub fn build_graph(node_count: u32, edges: &[(u32, u32, [f64; 3])]) -> (Graph, EdgeStore) {
    let mut store = EdgeStore::new();
    let mut ids = Vec::with_capacity(edges.len());
    for &(source, dest, cost) in edges {
        ids.push(store.push(source, dest, Cost(cost), None));
    }
    let nodes = (0..node_count).map(node).collect();
    (Graph::new(nodes, ids, &store), store)
}
