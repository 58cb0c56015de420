//! Pareto-set enumeration
//!
//! Finds up to `max_routes` pairwise-dissimilar Pareto-optimal routes, each
//! justified by the weight vector that makes it optimal. Discovered cost
//! vectors span a convex hull in cost space; every hull cell proposes the
//! weight vector on which its vertices project equally, and a query under
//! that vector either confirms the cell (no better route exists) or
//! contributes a new vertex. Crowded regions are explored first: a cell
//! whose routes already resemble many others is the likeliest to still hide
//! a distinct alternative. A final independent-set pass enforces pairwise
//! dissimilarity.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::ch::ChDijkstra;
use crate::cost::{Config, EDGE_COST_DIMENSION};
use crate::graph::{EdgeStore, Graph, NodePos};
use crate::hull::{CellKey, CostHull};
use crate::lp;
use crate::routes::{calculate_sharing, independent_set, Route};

#[derive(Debug, Clone)]
struct CellEntry {
    prio: f64,
    key: CellKey,
}

impl PartialEq for CellEntry {
    fn eq(&self, other: &Self) -> bool {
        self.prio == other.prio && self.key == other.key
    }
}

impl Eq for CellEntry {}

impl PartialOrd for CellEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; the key breaks ties deterministically.
        self.prio
            .total_cmp(&other.prio)
            .then_with(|| other.key.cmp(&self.key))
    }
}

pub struct EnumerateOptimals<'a> {
    store: &'a EdgeStore,
    dijkstra: ChDijkstra<'a>,
    hull: CostHull,
    routes: Vec<Route>,
    configs: Vec<Config>,
    similarities: FxHashMap<(usize, usize), f64>,
    factor: [f64; EDGE_COST_DIMENSION],
    max_overlap: f64,
    max_routes: usize,
}

impl<'a> EnumerateOptimals<'a> {
    pub fn new(graph: &'a Graph, store: &'a EdgeStore, max_routes: usize, max_overlap: f64) -> Self {
        EnumerateOptimals {
            store,
            dijkstra: ChDijkstra::new(graph, store),
            hull: CostHull::new(),
            routes: Vec::new(),
            configs: Vec::new(),
            similarities: FxHashMap::default(),
            factor: [1.0; EDGE_COST_DIMENSION],
            max_overlap,
            max_routes,
        }
    }

    /// Enumerates dissimilar Pareto-optimal routes from `from` to `to`.
    /// Returns the selected routes paired with the weight vectors under
    /// which they are optimal; empty when the nodes are not connected.
    pub fn find(&mut self, from: NodePos, to: NodePos) -> (Vec<Route>, Vec<Config>) {
        self.routes.clear();
        self.configs.clear();
        self.similarities.clear();
        self.hull = CostHull::new();
        self.factor = [1.0; EDGE_COST_DIMENSION];

        let uniform = Config::uniform();
        let Some(first) = self.dijkstra.find_best_route(from, to, &uniform) else {
            return (Vec::new(), Vec::new());
        };

        // One query per axis fixes the scaling factors before any point
        // enters the hull, so no metric dominates its geometry.
        let mut seeds = vec![(first, uniform)];
        for i in 0..EDGE_COST_DIMENSION {
            let config = Config::axis(i);
            if let Some(route) = self.dijkstra.find_best_route(from, to, &config) {
                self.factor[i] = route.costs[i];
                seeds.push((route, config));
            }
        }
        let max_value = self.factor.iter().fold(f64::MIN, |acc, &v| acc.max(v));
        for value in &mut self.factor {
            *value = if *value > 0.0 { max_value / *value } else { 1.0 };
        }

        for (route, config) in seeds {
            self.add_route(route, config);
        }

        let mut work_to_do = true;
        while work_to_do && self.routes.len() < self.max_routes {
            let mut queue = BinaryHeap::new();
            let mut current = self.include_convex_hull_cells(&mut queue);
            work_to_do = false;

            while let Some(CellEntry { key, .. }) = queue.pop() {
                if !current.contains(&key) || self.hull.checked(&key) {
                    continue;
                }
                self.hull.set_checked(&key);

                let points: Vec<_> = key.iter().map(|&v| self.hull.point(v)).collect();
                let Ok(scaled) = lp::cell_config(&points) else {
                    // Dead cell: no admissible weights project its vertices
                    // equally.
                    continue;
                };
                let config = self.descale_config(scaled);

                let Some(route) = self.dijkstra.find_best_route(from, to, &config) else {
                    continue;
                };
                let projected = route.costs.combine(&config);
                let cell_best = key
                    .iter()
                    .map(|&v| self.routes[v].costs.combine(&config))
                    .fold(f64::MAX, f64::min);
                if projected < cell_best {
                    self.add_route(route, config);
                    current = self.hull.full_cells().into_iter().collect();
                    work_to_do = true;
                }
            }
        }
        debug!(found = self.routes.len(), "enumeration finished");

        self.filter_dissimilar()
    }

    fn add_route(&mut self, route: Route, config: Config) {
        let mut scaled = [0.0; EDGE_COST_DIMENSION];
        for (i, value) in scaled.iter_mut().enumerate() {
            *value = route.costs[i] * self.factor[i];
        }
        let vertex = self.hull.insert(scaled);
        if vertex == self.routes.len() {
            self.routes.push(route);
            self.configs.push(config);
        }
    }

    /// Maps a weight vector found in scaled cost space back to the raw
    /// space the graph lives in.
    fn descale_config(&self, config: Config) -> Config {
        let mut values = config.0;
        for (value, factor) in values.iter_mut().zip(self.factor.iter()) {
            *value *= factor;
        }
        Config::normalized(values)
    }

    fn include_convex_hull_cells(&mut self, queue: &mut BinaryHeap<CellEntry>) -> FxHashSet<CellKey> {
        let cells = self.hull.full_cells();
        for key in &cells {
            if self.hull.prio(key) < 0.0 {
                let mut crowding = 0usize;
                for i in 0..self.routes.len() {
                    for &vertex in key {
                        if vertex != i && self.compare(i, vertex) > self.max_overlap {
                            crowding += 1;
                        }
                    }
                }
                self.hull.set_prio(key, crowding as f64);
            }
            queue.push(CellEntry { prio: self.hull.prio(key), key: key.clone() });
        }
        cells.into_iter().collect()
    }

    fn compare(&mut self, mut i: usize, mut j: usize) -> f64 {
        if i > j {
            std::mem::swap(&mut i, &mut j);
        }
        if let Some(&similarity) = self.similarities.get(&(i, j)) {
            return similarity;
        }
        let similarity = calculate_sharing(&self.routes[i], &self.routes[j], self.store);
        self.similarities.insert((i, j), similarity);
        similarity
    }

    /// Conflict graph over too-similar route pairs, then a greedy maximum
    /// independent set.
    fn filter_dissimilar(&mut self) -> (Vec<Route>, Vec<Config>) {
        let mut conflicts = Vec::new();
        for i in 0..self.routes.len() {
            for j in (i + 1)..self.routes.len() {
                if self.compare(i, j) > self.max_overlap {
                    conflicts.push((i, j));
                }
            }
        }
        let mut selection = independent_set(self.routes.len(), &conflicts);
        selection.truncate(self.max_routes);

        let routes = selection.iter().map(|&i| self.routes[i].clone()).collect();
        let configs = selection.iter().map(|&i| self.configs[i]).collect();
        (routes, configs)
    }
}
