//! Plain multi-path Dijkstra
//!
//! Reference search over the current graph's edges, no level pruning. Used
//! by the contraction workers to decide shortcut necessity and by the test
//! suite as ground truth for the hierarchy engine. Besides the best route
//! it tracks every predecessor edge tied for the optimum, which yields the
//! number of distinct co-optimal paths and an iterator over them.
//!
//! The per-instance arrays are sized to the node count once and reused
//! across searches, so a contraction worker pays the allocation only when a
//! round starts.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;

use crate::cost::{Config, Cost};
use crate::graph::{EdgeId, Graph, HalfEdge, NodePos};

const INITIAL_HEAP_SIZE: usize = 128;

/// An optimal route together with the number of distinct optimal paths.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteWithCount {
    pub edges: Vec<EdgeId>,
    pub costs: Cost,
    pub path_count: usize,
}

/// Min-heap entry ordered by combined cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub cost: f64,
    pub node: NodePos,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Inverted so BinaryHeap pops the cheapest candidate first.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

pub struct PlainDijkstra<'a> {
    graph: &'a Graph,
    cost: Vec<f64>,
    prev: Vec<Vec<HalfEdge>>,
    path_count: Vec<usize>,
    touched: Vec<NodePos>,
    last_search: Option<(NodePos, NodePos)>,
}

impl<'a> PlainDijkstra<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        let n = graph.node_count();
        PlainDijkstra {
            graph,
            cost: vec![f64::MAX; n],
            prev: vec![Vec::new(); n],
            path_count: vec![0; n],
            touched: Vec::new(),
            last_search: None,
        }
    }

    fn clear_state(&mut self) {
        for &node in &self.touched {
            self.cost[node] = f64::MAX;
            self.prev[node].clear();
            self.path_count[node] = 0;
        }
        self.touched.clear();
    }

    fn search(&mut self, from: NodePos, to: NodePos, config: &Config) {
        self.clear_state();
        self.last_search = Some((from, to));

        let mut heap = BinaryHeap::new();
        self.cost[from] = 0.0;
        self.path_count[from] = 1;
        self.touched.push(from);
        heap.push(Candidate { cost: 0.0, node: from });

        while let Some(Candidate { cost, node }) = heap.pop() {
            if cost > self.cost[node] {
                continue;
            }
            if node == to {
                break;
            }
            for edge in self.graph.out_edges(node) {
                let next_cost = cost + edge.cost.combine(config);
                let current = self.cost[edge.end];
                if next_cost < current {
                    if current == f64::MAX {
                        self.touched.push(edge.end);
                    }
                    self.cost[edge.end] = next_cost;
                    self.prev[edge.end].clear();
                    self.prev[edge.end].push(*edge);
                    self.path_count[edge.end] = self.path_count[node];
                    heap.push(Candidate { cost: next_cost, node: edge.end });
                } else if next_cost == current {
                    self.prev[edge.end].push(*edge);
                    self.path_count[edge.end] += self.path_count[node];
                }
            }
        }
    }

    /// The optimal route from `from` to `to` under `config`, together with
    /// the number of distinct optimal paths. `None` if `to` is unreachable.
    pub fn best_route(&mut self, from: NodePos, to: NodePos, config: &Config) -> Option<RouteWithCount> {
        self.search(from, to, config);
        if self.cost[to] == f64::MAX {
            return None;
        }

        let mut edges = Vec::new();
        let mut costs = Cost::default();
        let mut current = to;
        while current != from {
            let edge = self.prev[current][0];
            edges.push(edge.id);
            costs = costs + edge.cost;
            current = edge.begin;
        }
        edges.reverse();

        Some(RouteWithCount { edges, costs, path_count: self.path_count[to] })
    }

    /// Iterates the co-optimal routes of the last search. Must follow a
    /// `best_route` call for the same pair.
    pub fn route_iter(&self, from: NodePos, to: NodePos) -> RouteIterator<'_, 'a> {
        debug_assert_eq!(self.last_search, Some((from, to)), "route_iter must follow best_route");
        RouteIterator::new(self, from, to)
    }
}

#[derive(Debug, Clone)]
struct PartialWalk {
    node: NodePos,
    edges: Vec<EdgeId>,
    costs: Cost,
}

/// Suspendable producer of co-optimal routes.
///
/// The backward walk over the predecessor DAG keeps its frontier bounded;
/// once the bound truncates branches, `finished` only means "exhausted at
/// the current heap size" and `double_heapsize` restarts the walk with a
/// larger bound, skipping routes already produced.
pub struct RouteIterator<'d, 'g> {
    dijkstra: &'d PlainDijkstra<'g>,
    from: NodePos,
    to: NodePos,
    frontier: Vec<PartialWalk>,
    yielded: FxHashSet<Vec<EdgeId>>,
    max_heap_size: usize,
    truncated: bool,
}

impl<'d, 'g> RouteIterator<'d, 'g> {
    fn new(dijkstra: &'d PlainDijkstra<'g>, from: NodePos, to: NodePos) -> Self {
        let mut iter = RouteIterator {
            dijkstra,
            from,
            to,
            frontier: Vec::new(),
            yielded: FxHashSet::default(),
            max_heap_size: INITIAL_HEAP_SIZE,
            truncated: false,
        };
        iter.reset_frontier();
        iter
    }

    fn reset_frontier(&mut self) {
        self.frontier.clear();
        self.truncated = false;
        if self.dijkstra.cost[self.to] != f64::MAX {
            self.frontier.push(PartialWalk {
                node: self.to,
                edges: Vec::new(),
                costs: Cost::default(),
            });
        }
    }

    /// True once no further route can be produced at the current heap
    /// size. While truncated branches are pending this stays false and
    /// `double_heapsize` will recover them.
    pub fn finished(&self) -> bool {
        self.frontier.is_empty() && !self.truncated
    }

    /// Grows the frontier bound and restarts the walk; routes yielded so
    /// far are not produced again.
    pub fn double_heapsize(&mut self) {
        self.max_heap_size *= 2;
        self.reset_frontier();
    }

    pub fn next(&mut self) -> Option<RouteWithCount> {
        while let Some(walk) = self.frontier.pop() {
            if walk.node == self.from {
                let mut edges = walk.edges;
                edges.reverse();
                if self.yielded.insert(edges.clone()) {
                    return Some(RouteWithCount {
                        edges,
                        costs: walk.costs,
                        path_count: self.dijkstra.path_count[self.to],
                    });
                }
                continue;
            }
            for edge in &self.dijkstra.prev[walk.node] {
                if self.frontier.len() >= self.max_heap_size {
                    self.truncated = true;
                    break;
                }
                let mut edges = walk.edges.clone();
                edges.push(edge.id);
                self.frontier.push(PartialWalk {
                    node: edge.begin,
                    edges,
                    costs: walk.costs + edge.cost,
                });
            }
        }
        None
    }
}
