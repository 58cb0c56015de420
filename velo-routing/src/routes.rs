//! Route utilities: shortcut unpacking, similarity, loads, route selection

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cost::Cost;
use crate::graph::{EdgeId, EdgeStore, Graph, NodeId};

/// A route as returned by the CH engine: primitive edges in path order plus
/// the summed cost vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub edges: Vec<EdgeId>,
    pub costs: Cost,
}

/// Recursively resolves an edge into the primitive edges it shortcuts.
///
/// Shortcut children are replayed in path order; `front` flips the
/// recursion so edges collected while walking back towards the source land
/// in the right order.
pub fn insert_unpacked_edge(store: &EdgeStore, id: EdgeId, route: &mut VecDeque<EdgeId>, front: bool) {
    let edge = store.get(id);
    match edge.skip {
        Some((a, b)) => {
            if front {
                insert_unpacked_edge(store, b, route, front);
                insert_unpacked_edge(store, a, route, front);
            } else {
                insert_unpacked_edge(store, a, route, front);
                insert_unpacked_edge(store, b, route, front);
            }
        }
        None => {
            if front {
                route.push_front(id);
            } else {
                route.push_back(id);
            }
        }
    }
}

/// The primitive edge sequence of a single (possibly shortcut) edge.
pub fn unpack_edge(store: &EdgeStore, id: EdgeId) -> Vec<EdgeId> {
    let mut route = VecDeque::new();
    insert_unpacked_edge(store, id, &mut route, false);
    route.into()
}

fn unpacked_edges(route: &Route, store: &EdgeStore) -> Vec<EdgeId> {
    let mut edges = VecDeque::new();
    for &id in &route.edges {
        insert_unpacked_edge(store, id, &mut edges, false);
    }
    edges.into()
}

fn primitive_length(edges: &[EdgeId], store: &EdgeStore) -> f64 {
    edges.iter().map(|&id| store.get(id).cost.length()).sum()
}

/// Fraction of the shorter route's length covered by edges both routes
/// traverse. Computed over fully unpacked edge sequences.
pub fn calculate_sharing(a: &Route, b: &Route, store: &EdgeStore) -> f64 {
    let edges_a = unpacked_edges(a, store);
    let edges_b = unpacked_edges(b, store);
    let set_a: FxHashSet<EdgeId> = edges_a.iter().copied().collect();

    let shared: f64 = edges_b
        .iter()
        .filter(|id| set_a.contains(id))
        .map(|&id| store.get(id).cost.length())
        .sum();

    let shorter = primitive_length(&edges_a, store).min(primitive_length(&edges_b, store));
    if shorter <= 0.0 {
        return 0.0;
    }
    shared / shorter
}

/// Fraction of routes traversing each primitive edge.
#[derive(Debug)]
pub struct EdgeLoads {
    loads: FxHashMap<EdgeId, usize>,
    route_count: usize,
}

impl EdgeLoads {
    pub fn new(routes: &[Route], store: &EdgeStore) -> Self {
        // Avoids special casing the empty set in `load`.
        let route_count = routes.len().max(1);
        let mut loads = FxHashMap::default();
        for route in routes {
            for id in unpacked_edges(route, store) {
                *loads.entry(id).or_insert(0) += 1;
            }
        }
        EdgeLoads { loads, route_count }
    }

    pub fn load(&self, edge: EdgeId) -> f64 {
        *self.loads.get(&edge).unwrap_or(&0) as f64 / self.route_count as f64
    }
}

/// Greedy maximum independent set over `n` vertices: repeatedly pick the
/// lowest-degree vertex whose neighbors are all unselected.
pub fn independent_set(n: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(a, b) in edges {
        neighbors[a].push(b);
        neighbors[b].push(a);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&v| (neighbors[v].len(), v));

    let mut selected = vec![false; n];
    let mut blocked = vec![false; n];
    for v in order {
        if blocked[v] {
            continue;
        }
        selected[v] = true;
        for &w in &neighbors[v] {
            blocked[w] = true;
        }
    }

    (0..n).filter(|&v| selected[v]).collect()
}

fn route_coordinates(route: &Route, store: &EdgeStore, graph: &Graph) -> Vec<(f64, f64)> {
    let edges = unpacked_edges(route, store);
    let mut node_ids: Vec<NodeId> = Vec::with_capacity(edges.len() + 1);
    for &id in &edges {
        node_ids.push(store.get(id).source);
    }
    if let Some(&last) = edges.last() {
        node_ids.push(store.get(last).dest);
    }
    node_ids
        .into_iter()
        .filter_map(|id| graph.node_by_id(id))
        .map(|node| (node.lat, node.lng))
        .collect()
}

pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Discrete Fréchet distance between the node sequences of two routes, in
/// meters.
pub fn frechet_distance(a: &Route, b: &Route, store: &EdgeStore, graph: &Graph) -> f64 {
    let p = route_coordinates(a, store, graph);
    let q = route_coordinates(b, store, graph);
    if p.is_empty() || q.is_empty() {
        return 0.0;
    }

    let dist = |i: usize, j: usize| haversine_distance(p[i].0, p[i].1, q[j].0, q[j].1);

    let mut row = vec![0.0; q.len()];
    row[0] = dist(0, 0);
    for j in 1..q.len() {
        row[j] = row[j - 1].max(dist(0, j));
    }
    for i in 1..p.len() {
        let mut prev_diag = row[0];
        row[0] = row[0].max(dist(i, 0));
        for j in 1..q.len() {
            let reachable = prev_diag.min(row[j]).min(row[j - 1]);
            prev_diag = row[j];
            row[j] = reachable.max(dist(i, j));
        }
    }
    row[q.len() - 1]
}
