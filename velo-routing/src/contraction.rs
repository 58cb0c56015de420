//! Contraction hierarchy builder
//!
//! Each round picks an independent set of the current core graph, keeps the
//! cheaper half by edge-pair workload, and hands every `(incoming,
//! outgoing)` pair of those nodes to a worker pool. A worker proves or
//! refutes shortcut necessity with its own plain Dijkstra and witness LP;
//! the coordinator assigns edge ids to the surviving shortcuts
//! single-threaded and assembles the next, smaller core graph. Contracted
//! nodes and their edges accumulate in a frozen prefix that the final merge
//! step reattaches below the remaining core.

use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use crate::cost::Config;
use crate::dijkstra::PlainDijkstra;
use crate::graph::{EdgeId, EdgeStore, Graph, HalfEdge, Node, NodePos, ProtoShortcut};
use crate::lp::ShortcutLp;

/// After this many witness constraints the LP is assumed feasible and the
/// shortcut committed without a proof.
const MAX_LP_CONSTRAINTS: usize = 150;

/// Why a worker committed a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutReason {
    /// The pair was the unique optimum under some tested weight vector.
    ShortestPath,
    /// The LP witness plane stabilized and Dijkstra had no further refuting
    /// path to offer.
    RepeatingConfig,
    /// Constraint budget exceeded; committed heuristically.
    TooManyConstraints,
}

/// Per-worker counters, merged by the coordinator on teardown.
#[derive(Debug, Default, Clone)]
pub struct ShortcutStats {
    pub shortest_path: usize,
    pub repeating_config: usize,
    pub too_many_constraints: usize,
    pub lp_max: usize,
    pub constraint_max: usize,
}

impl ShortcutStats {
    fn count(&mut self, reason: ShortcutReason) {
        match reason {
            ShortcutReason::ShortestPath => self.shortest_path += 1,
            ShortcutReason::RepeatingConfig => self.repeating_config += 1,
            ShortcutReason::TooManyConstraints => self.too_many_constraints += 1,
        }
    }

    fn record_max(&mut self, lp_calls: usize, constraints: usize) {
        self.lp_max = self.lp_max.max(lp_calls);
        self.constraint_max = self.constraint_max.max(constraints);
    }

    fn merge(&mut self, other: &ShortcutStats) {
        self.shortest_path += other.shortest_path;
        self.repeating_config += other.repeating_config;
        self.too_many_constraints += other.too_many_constraints;
        self.lp_max = self.lp_max.max(other.lp_max);
        self.constraint_max = self.constraint_max.max(other.constraint_max);
    }
}

/// Tagged message on the worker queue. `Collect` is the teardown signal: the
/// worker sends its accumulated results through the carried channel and
/// terminates.
enum Job {
    EdgePair { in_edge: HalfEdge, out_edge: HalfEdge },
    Collect(Sender<WorkerReport>),
}

struct WorkerReport {
    shortcuts: Vec<ProtoShortcut>,
    stats: ShortcutStats,
}

enum CheckOutcome {
    Commit(ShortcutReason),
    Abandon,
}

pub struct Contractor {
    level: u32,
    contracted_nodes: Vec<Node>,
    contracted_edges: Vec<EdgeId>,
    print_statistics: bool,
}

impl Contractor {
    pub fn new(print_statistics: bool) -> Self {
        Contractor {
            level: 0,
            contracted_nodes: Vec::new(),
            contracted_edges: Vec::new(),
            print_statistics,
        }
    }

    /// Runs contraction rounds until at most `rest_percent` of the original
    /// nodes remain uncontracted, then merges the frozen prefix back in.
    /// The returned graph answers the same distance queries as the input
    /// under every weight vector.
    pub fn contract_completely(
        &mut self,
        store: &mut EdgeStore,
        graph: &Graph,
        rest_percent: u32,
    ) -> Graph {
        let original_nodes = graph.node_count().max(1);
        let mut current = self.contract(store, graph);
        let mut uncontracted = current.node_count() * 100 / original_nodes;
        info!(contracted_percent = 100 - uncontracted, "contraction progress");
        while uncontracted > rest_percent as usize {
            current = self.contract(store, &current);
            uncontracted = current.node_count() * 100 / original_nodes;
            info!(contracted_percent = 100 - uncontracted, "contraction progress");
        }
        self.merge_with_contracted(store, &current)
    }

    /// One contraction round: returns the next core graph.
    pub fn contract(&mut self, store: &mut EdgeStore, graph: &Graph) -> Graph {
        let start = Instant::now();
        self.level += 1;

        let to_contract = reduce(independent_set(graph), graph);

        let mut kept_nodes = Vec::new();
        let mut edges: Vec<EdgeId> = Vec::new();
        let mut nodes_to_contract: Vec<NodePos> = Vec::new();
        for pos in 0..graph.node_count() {
            if to_contract[pos] {
                nodes_to_contract.push(pos);
                let mut node = graph.node(pos).clone();
                node.level = self.level;
                self.contracted_nodes.push(node);
                for edge in graph.out_edges(pos) {
                    self.contracted_edges.push(edge.id);
                }
                for edge in graph.in_edges(pos) {
                    self.contracted_edges.push(edge.id);
                }
            } else {
                kept_nodes.push(graph.node(pos).clone());
                for edge in graph.out_edges(pos) {
                    if !to_contract[edge.end] {
                        edges.push(edge.id);
                    }
                }
            }
        }

        // Heaviest nodes first, so the expensive pair batches start while
        // the queue is still filling.
        nodes_to_contract
            .sort_by(|&a, &b| graph.in_times_out_degree(b).cmp(&graph.in_times_out_degree(a)));

        let (shortcuts, stats) = self.run_workers(store, graph, &nodes_to_contract);

        if self.print_statistics {
            info!(
                shortest_path = stats.shortest_path,
                repeating_config = stats.repeating_config,
                too_many_constraints = stats.too_many_constraints,
                lp_max = stats.lp_max,
                constraint_max = stats.constraint_max,
                "shortcut statistics"
            );
        }

        let shortcut_count = shortcuts.len();
        edges.extend(store.administer(shortcuts));

        let next = Graph::new(kept_nodes, edges, store);
        info!(
            level = self.level,
            shortcuts = shortcut_count,
            remaining_nodes = next.node_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "contraction round finished"
        );
        next
    }

    fn run_workers(
        &self,
        store: &EdgeStore,
        graph: &Graph,
        nodes_to_contract: &[NodePos],
    ) -> (Vec<ProtoShortcut>, ShortcutStats) {
        let worker_count = num_cpus::get().max(1);
        let (job_tx, job_rx) = unbounded::<Job>();
        let (report_tx, report_rx) = unbounded::<WorkerReport>();

        let mut shortcuts = Vec::new();
        let mut stats = ShortcutStats::default();
        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                let jobs = job_rx.clone();
                scope.spawn(move || worker(jobs, graph, store));
            }

            let mut pair_count = 0usize;
            for &pos in nodes_to_contract {
                for in_edge in graph.in_edges(pos) {
                    for out_edge in graph.out_edges(pos) {
                        job_tx
                            .send(Job::EdgePair { in_edge: *in_edge, out_edge: *out_edge })
                            .expect("workers outlive the job queue");
                        pair_count += 1;
                    }
                }
            }
            debug!(pairs = pair_count, workers = worker_count, "queued shortcut candidates");

            for _ in 0..worker_count {
                job_tx
                    .send(Job::Collect(report_tx.clone()))
                    .expect("workers outlive the job queue");
            }
            for _ in 0..worker_count {
                let report = report_rx.recv().expect("every worker reports back");
                shortcuts.extend(report.shortcuts);
                stats.merge(&report.stats);
            }
        });

        (shortcuts, stats)
    }

    /// Appends the frozen contracted prefix below the remaining core; the
    /// core receives the final, highest level.
    fn merge_with_contracted(&mut self, store: &EdgeStore, graph: &Graph) -> Graph {
        self.level += 1;

        let mut nodes = std::mem::take(&mut self.contracted_nodes);
        let mut edges = std::mem::take(&mut self.contracted_edges);
        for pos in 0..graph.node_count() {
            let mut node = graph.node(pos).clone();
            node.level = self.level;
            nodes.push(node);
            for edge in graph.out_edges(pos) {
                edges.push(edge.id);
            }
        }

        info!(nodes = nodes.len(), edges = edges.len(), "merged final hierarchy");
        Graph::new(nodes, edges, store)
    }
}

/// Greedy maximal independent set: a node is taken unless an already-taken
/// neighbor rules it out.
fn independent_set(graph: &Graph) -> Vec<bool> {
    let mut selected = vec![true; graph.node_count()];
    for pos in 0..graph.node_count() {
        if selected[pos] {
            for edge in graph.in_edges(pos) {
                if edge.end != pos {
                    selected[edge.end] = false;
                }
            }
            for edge in graph.out_edges(pos) {
                if edge.end != pos {
                    selected[edge.end] = false;
                }
            }
        }
    }
    selected
}

/// Keeps the half of the set with the smaller `|in|·|out|` workload,
/// spreading shortcut work across rounds.
fn reduce(selected: Vec<bool>, graph: &Graph) -> Vec<bool> {
    let mut metric: Vec<(NodePos, usize)> = selected
        .iter()
        .enumerate()
        .filter(|(_, &s)| s)
        .map(|(pos, _)| (pos, graph.in_times_out_degree(pos)))
        .collect();

    let keep = if metric.len() <= 1 { metric.len() } else { metric.len() / 2 };
    metric.sort_unstable_by_key(|&(pos, count)| (count, pos));
    metric.truncate(keep);

    let mut reduced = vec![false; selected.len()];
    for (pos, _) in metric {
        reduced[pos] = true;
    }
    reduced
}

fn worker(jobs: Receiver<Job>, graph: &Graph, store: &EdgeStore) {
    let mut dijkstra = PlainDijkstra::new(graph);
    let mut shortcuts = Vec::new();
    let mut stats = ShortcutStats::default();

    while let Ok(job) = jobs.recv() {
        match job {
            Job::EdgePair { in_edge, out_edge } => {
                if let Some(shortcut) =
                    check_edge_pair(&mut dijkstra, store, &in_edge, &out_edge, &mut stats)
                {
                    shortcuts.push(shortcut);
                }
            }
            Job::Collect(reply) => {
                let _ = reply.send(WorkerReport { shortcuts, stats });
                return;
            }
        }
    }
}

/// Decides whether some admissible weight vector makes `in_edge, out_edge`
/// the unique optimum between its endpoints. Every refuting route becomes
/// an LP constraint; infeasibility proves the shortcut unnecessary.
pub fn check_edge_pair(
    dijkstra: &mut PlainDijkstra,
    store: &EdgeStore,
    in_edge: &HalfEdge,
    out_edge: &HalfEdge,
    stats: &mut ShortcutStats,
) -> Option<ProtoShortcut> {
    let from = in_edge.end;
    let to = out_edge.end;
    let shortcut_cost = in_edge.cost + out_edge.cost;

    let mut config = Config::uniform();
    let mut lp = ShortcutLp::new();
    let mut lp_calls = 0usize;

    let is_pair =
        |edges: &[EdgeId]| edges.len() == 2 && edges[0] == in_edge.id && edges[1] == out_edge.id;

    let reason = 'outer: loop {
        let Some(route) = dijkstra.best_route(from, to, &config) else {
            break 'outer None;
        };
        if route.edges.is_empty() {
            break 'outer None;
        }
        if is_pair(&route.edges) && route.path_count == 1 {
            break 'outer Some(ShortcutReason::ShortestPath);
        }

        let mut routes = dijkstra.route_iter(from, to);
        let mut outcome = None;
        while !routes.finished() {
            while let Some(witness) = routes.next() {
                if is_pair(&witness.edges) {
                    continue;
                }
                let diff = shortcut_cost - witness.costs;
                // The constraint mirrors the tie-break of the cost model: a
                // witness with more edges loses dot-product ties, one with
                // fewer edges wins them. Exact vector ties between two-edge
                // paths are decided by the edge-id sequence so exactly one
                // of the two survives contraction.
                let strict = match witness.edges.len() {
                    n if n >= 3 => false,
                    2 if witness.costs == shortcut_cost => {
                        if witness.edges.as_slice() < &[in_edge.id, out_edge.id][..] {
                            true
                        } else {
                            continue;
                        }
                    }
                    _ => true,
                };
                lp.add_constraint(diff.0, strict);
            }

            if lp.constraint_count() > MAX_LP_CONSTRAINTS {
                outcome = Some(CheckOutcome::Commit(ShortcutReason::TooManyConstraints));
                break;
            }

            lp_calls += 1;
            match lp.solve() {
                Err(_) => {
                    outcome = Some(CheckOutcome::Abandon);
                    break;
                }
                Ok(new_config) => {
                    if config.approx_eq(&new_config) {
                        if routes.finished() {
                            outcome = Some(CheckOutcome::Commit(ShortcutReason::RepeatingConfig));
                            break;
                        }
                        routes.double_heapsize();
                    }
                    config = new_config;
                }
            }
        }

        match outcome {
            Some(CheckOutcome::Commit(reason)) => break 'outer Some(reason),
            Some(CheckOutcome::Abandon) => break 'outer None,
            None => {} // config moved: query again
        }
    };

    stats.record_max(lp_calls, lp.constraint_count());
    reason.map(|reason| {
        stats.count(reason);
        create_shortcut(store, in_edge.id, out_edge.id)
    })
}

fn create_shortcut(store: &EdgeStore, in_id: EdgeId, out_id: EdgeId) -> ProtoShortcut {
    let first = store.get(in_id);
    let second = store.get(out_id);
    debug_assert_eq!(first.dest, second.source, "shortcut children must be connected");
    ProtoShortcut {
        source: first.source,
        dest: second.dest,
        cost: first.cost + second.cost,
        skip: (in_id, out_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Cost;

    fn node(id: u32) -> Node {
        Node { id, osm_id: id as u64, lat: 0.0, lng: 0.0, height: 0.0, level: 0 }
    }

    fn chain_graph() -> (Graph, EdgeStore) {
        let mut store = EdgeStore::new();
        let e0 = store.push(0, 1, Cost::new(1.0, 0.0, 0.0), None);
        let e1 = store.push(1, 2, Cost::new(1.0, 0.0, 0.0), None);
        let nodes = vec![node(0), node(1), node(2)];
        (Graph::new(nodes, vec![e0, e1], &store), store)
    }

    #[test]
    fn independent_set_has_no_adjacent_pair() {
        let (graph, _) = chain_graph();
        let selected = independent_set(&graph);
        for pos in 0..graph.node_count() {
            if selected[pos] {
                for edge in graph.out_edges(pos) {
                    assert!(!selected[edge.end]);
                }
                for edge in graph.in_edges(pos) {
                    assert!(!selected[edge.end]);
                }
            }
        }
        assert!(selected.iter().any(|&s| s));
    }

    #[test]
    fn reduce_keeps_the_lighter_half() {
        let mut store = EdgeStore::new();
        // Node 1 carries one edge pair, node 3 none.
        let e0 = store.push(0, 1, Cost::new(1.0, 0.0, 0.0), None);
        let e1 = store.push(1, 2, Cost::new(1.0, 0.0, 0.0), None);
        let nodes = vec![node(0), node(1), node(2), node(3)];
        let graph = Graph::new(nodes, vec![e0, e1], &store);

        let mut selected = vec![false; 4];
        selected[graph.node_pos(1).unwrap()] = true;
        selected[graph.node_pos(3).unwrap()] = true;
        let reduced = reduce(selected, &graph);
        assert!(reduced[graph.node_pos(3).unwrap()]);
        assert!(!reduced[graph.node_pos(1).unwrap()]);
    }

    #[test]
    fn unique_chain_produces_shortcut() {
        let (graph, store) = chain_graph();
        let mut dijkstra = PlainDijkstra::new(&graph);
        let mut stats = ShortcutStats::default();
        let v = graph.node_pos(1).unwrap();
        let in_edge = graph.in_edges(v)[0];
        let out_edge = graph.out_edges(v)[0];
        let shortcut = check_edge_pair(&mut dijkstra, &store, &in_edge, &out_edge, &mut stats)
            .expect("chain midpoint needs a shortcut");
        assert_eq!(shortcut.source, 0);
        assert_eq!(shortcut.dest, 2);
        assert_eq!(shortcut.cost, Cost::new(2.0, 0.0, 0.0));
        assert_eq!(shortcut.skip, (in_edge.id, out_edge.id));
        assert_eq!(stats.shortest_path, 1);
    }

    #[test]
    fn equal_cost_alternative_refutes_shortcut() {
        // u→v→w against a parallel edge with the identical total vector:
        // co-optimal under every weight vector, so no shortcut is needed.
        let mut store = EdgeStore::new();
        let e0 = store.push(0, 1, Cost::new(1.0, 1.0, 0.0), None);
        let e1 = store.push(1, 2, Cost::new(1.0, 1.0, 0.0), None);
        let alt = store.push(0, 2, Cost::new(2.0, 2.0, 0.0), None);
        let nodes = vec![node(0), node(1), node(2)];
        let graph = Graph::new(nodes, vec![e0, e1, alt], &store);

        let mut dijkstra = PlainDijkstra::new(&graph);
        let mut stats = ShortcutStats::default();
        let v = graph.node_pos(1).unwrap();
        let in_edge = graph.in_edges(v)[0];
        let out_edge = graph.out_edges(v)[0];
        assert!(check_edge_pair(&mut dijkstra, &store, &in_edge, &out_edge, &mut stats).is_none());
    }

    #[test]
    fn self_pair_is_abandoned() {
        // in and out lead back to the same node; the trivial empty route
        // wins and no loop shortcut is created.
        let mut store = EdgeStore::new();
        let e0 = store.push(0, 1, Cost::new(1.0, 0.0, 0.0), None);
        let e1 = store.push(1, 0, Cost::new(1.0, 0.0, 0.0), None);
        let nodes = vec![node(0), node(1)];
        let graph = Graph::new(nodes, vec![e0, e1], &store);

        let mut dijkstra = PlainDijkstra::new(&graph);
        let mut stats = ShortcutStats::default();
        let v = graph.node_pos(1).unwrap();
        let in_edge = graph.in_edges(v)[0];
        let out_edge = graph.out_edges(v)[0];
        assert_eq!(in_edge.end, out_edge.end);
        assert!(check_edge_pair(&mut dijkstra, &store, &in_edge, &out_edge, &mut stats).is_none());
    }

    #[test]
    fn contract_round_freezes_selected_nodes() {
        let (graph, mut store) = chain_graph();
        let mut contractor = Contractor::new(false);
        let next = contractor.contract(&mut store, &graph);
        assert!(next.node_count() < graph.node_count());
        assert!(!contractor.contracted_nodes.is_empty());
    }
}
