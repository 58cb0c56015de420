//! Bidirectional search over the contraction hierarchy
//!
//! Both directions climb upward only: adjacency is sorted by descending far
//! level, so scanning stops at the first neighbor below the settled node's
//! level. Stall-on-demand skips a node whenever a higher-level neighbor
//! already provides a cheaper way to it. The two searches meet somewhere
//! near the top of the hierarchy; the reconstructed route unpacks every
//! shortcut back into primitive edges.

use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::FxHashMap;

use crate::cost::{Config, Cost};
use crate::dijkstra::Candidate;
use crate::graph::{EdgeStore, Graph, HalfEdge, NodePos};
use crate::routes::{insert_unpacked_edge, Route};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Forward,
    Backward,
}

pub struct ChDijkstra<'a> {
    graph: &'a Graph,
    store: &'a EdgeStore,
    cost_s: Vec<f64>,
    cost_t: Vec<f64>,
    touched_s: Vec<NodePos>,
    touched_t: Vec<NodePos>,
    prev_s: FxHashMap<NodePos, HalfEdge>,
    prev_t: FxHashMap<NodePos, HalfEdge>,
}

impl<'a> ChDijkstra<'a> {
    pub fn new(graph: &'a Graph, store: &'a EdgeStore) -> Self {
        let n = graph.node_count();
        ChDijkstra {
            graph,
            store,
            cost_s: vec![f64::MAX; n],
            cost_t: vec![f64::MAX; n],
            touched_s: Vec::new(),
            touched_t: Vec::new(),
            prev_s: FxHashMap::default(),
            prev_t: FxHashMap::default(),
        }
    }

    fn clear_state(&mut self) {
        for &node in &self.touched_s {
            self.cost_s[node] = f64::MAX;
        }
        self.touched_s.clear();
        for &node in &self.touched_t {
            self.cost_t[node] = f64::MAX;
        }
        self.touched_t.clear();
        self.prev_s.clear();
        self.prev_t.clear();
    }

    /// The optimal route from `from` to `to` under `config`, or `None` when
    /// the two search frontiers never meet.
    pub fn find_best_route(&mut self, from: NodePos, to: NodePos, config: &Config) -> Option<Route> {
        self.clear_state();

        let mut heap_s = BinaryHeap::new();
        let mut heap_t = BinaryHeap::new();
        self.cost_s[from] = 0.0;
        self.touched_s.push(from);
        heap_s.push(Candidate { cost: 0.0, node: from });
        self.cost_t[to] = 0.0;
        self.touched_t.push(to);
        heap_t.push(Candidate { cost: 0.0, node: to });

        let mut s_bigger = false;
        let mut t_bigger = false;
        let mut min_candidate = f64::MAX;
        let mut min_node: Option<NodePos> = None;

        'search: loop {
            // Quit once both heaps are drained, or one is drained and the
            // other already exceeds the best meeting candidate.
            if (heap_s.is_empty() && heap_t.is_empty())
                || (heap_s.is_empty() && t_bigger)
                || (heap_t.is_empty() && s_bigger)
            {
                return min_node.map(|node| self.build_route(node, from, to));
            }
            if s_bigger && t_bigger {
                let node = min_node.expect("exhausted directions imply a meeting candidate");
                return Some(self.build_route(node, from, to));
            }

            if !heap_s.is_empty() && !s_bigger {
                let Candidate { cost, node } = heap_s.pop().expect("heap checked non-empty");
                if cost > self.cost_s[node] {
                    continue 'search;
                }
                if self.stall_on_demand(node, cost, Direction::Forward, config) {
                    continue 'search;
                }
                if cost > min_candidate {
                    s_bigger = true;
                    continue 'search;
                }
                if self.cost_t[node] != f64::MAX {
                    let candidate = self.cost_s[node] + self.cost_t[node];
                    if candidate < min_candidate {
                        min_candidate = candidate;
                        min_node = Some(node);
                    }
                }
                self.relax_edges(node, cost, Direction::Forward, &mut heap_s, config);
            }

            if !heap_t.is_empty() && !t_bigger {
                let Candidate { cost, node } = heap_t.pop().expect("heap checked non-empty");
                if cost > self.cost_t[node] {
                    continue 'search;
                }
                if self.stall_on_demand(node, cost, Direction::Backward, config) {
                    continue 'search;
                }
                if cost > min_candidate {
                    t_bigger = true;
                    continue 'search;
                }
                if self.cost_s[node] != f64::MAX {
                    let candidate = self.cost_s[node] + self.cost_t[node];
                    if candidate < min_candidate {
                        min_candidate = candidate;
                        min_node = Some(node);
                    }
                }
                self.relax_edges(node, cost, Direction::Backward, &mut heap_t, config);
            }
        }
    }

    fn relax_edges(
        &mut self,
        node: NodePos,
        cost: f64,
        dir: Direction,
        heap: &mut BinaryHeap<Candidate>,
        config: &Config,
    ) {
        let my_level = self.graph.level_of(node);
        let edges = match dir {
            Direction::Forward => self.graph.out_edges(node),
            Direction::Backward => self.graph.in_edges(node),
        };
        for edge in edges {
            // Sorted by descending level: everything beyond is downward.
            if self.graph.level_of(edge.end) < my_level {
                break;
            }
            let next_cost = cost + edge.cost.combine(config);
            let (costs, touched, prev) = match dir {
                Direction::Forward => (&mut self.cost_s, &mut self.touched_s, &mut self.prev_s),
                Direction::Backward => (&mut self.cost_t, &mut self.touched_t, &mut self.prev_t),
            };
            if next_cost < costs[edge.end] {
                if costs[edge.end] == f64::MAX {
                    touched.push(edge.end);
                }
                costs[edge.end] = next_cost;
                prev.insert(edge.end, *edge);
                heap.push(Candidate { cost: next_cost, node: edge.end });
            }
        }
    }

    fn stall_on_demand(&self, node: NodePos, cost: f64, dir: Direction, config: &Config) -> bool {
        let my_level = self.graph.level_of(node);
        let (edges, costs) = match dir {
            Direction::Forward => (self.graph.in_edges(node), &self.cost_s),
            Direction::Backward => (self.graph.out_edges(node), &self.cost_t),
        };
        for edge in edges {
            if self.graph.level_of(edge.end) < my_level {
                break;
            }
            if costs[edge.end] != f64::MAX && costs[edge.end] + edge.cost.combine(config) < cost {
                return true;
            }
        }
        false
    }

    fn build_route(&self, meeting: NodePos, from: NodePos, to: NodePos) -> Route {
        let mut edges = VecDeque::new();
        let mut costs = Cost::default();

        let mut current = meeting;
        while current != from {
            let edge = self.prev_s[&current];
            costs = costs + edge.cost;
            insert_unpacked_edge(self.store, edge.id, &mut edges, true);
            current = edge.begin;
        }

        current = meeting;
        while current != to {
            let edge = self.prev_t[&current];
            costs = costs + edge.cost;
            insert_unpacked_edge(self.store, edge.id, &mut edges, false);
            current = edge.begin;
        }

        Route { edges: edges.into(), costs }
    }
}
