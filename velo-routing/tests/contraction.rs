//! Contraction end-to-end scenarios and hierarchy invariants

mod common;

use common::build_graph;
use velo_routing::contraction::{check_edge_pair, ShortcutStats};
use velo_routing::routes::unpack_edge;
use velo_routing::{ChDijkstra, Config, Contractor, Cost, PlainDijkstra};

#[test]
fn single_edge_graph_contracts_without_shortcuts() {
    let (graph, mut store) = build_graph(2, &[(0, 1, [10.0, 0.0, 0.0])]);
    let edges_before = store.len();

    let mut contractor = Contractor::new(false);
    let contracted = contractor.contract_completely(&mut store, &graph, 0);

    assert_eq!(store.len(), edges_before);
    assert_eq!(contracted.node_count(), 2);

    let mut ch = ChDijkstra::new(&contracted, &store);
    let from = contracted.node_pos(0).unwrap();
    let to = contracted.node_pos(1).unwrap();
    let route = ch.find_best_route(from, to, &Config::axis(0)).unwrap();
    assert_eq!(route.costs, Cost::new(10.0, 0.0, 0.0));
}

#[test]
fn contracting_a_chain_midpoint_creates_the_spanning_shortcut() {
    // u→v→w with no alternative: the pair is uniquely optimal under any
    // weight vector.
    let (graph, store) = build_graph(3, &[(0, 1, [1.0, 0.0, 0.0]), (1, 2, [1.0, 0.0, 0.0])]);

    let mut dijkstra = PlainDijkstra::new(&graph);
    let mut stats = ShortcutStats::default();
    let v = graph.node_pos(1).unwrap();
    let shortcut = check_edge_pair(
        &mut dijkstra,
        &store,
        &graph.in_edges(v)[0],
        &graph.out_edges(v)[0],
        &mut stats,
    )
    .expect("chain midpoint needs a shortcut");

    assert_eq!((shortcut.source, shortcut.dest), (0, 2));
    assert_eq!(shortcut.cost, Cost::new(2.0, 0.0, 0.0));
    assert_eq!(shortcut.skip, (0, 1));
    assert_eq!(stats.shortest_path, 1);
}

#[test]
fn equal_cost_parallel_path_needs_no_shortcut() {
    // Chain and direct edge are co-optimal under every weight vector, so
    // the witness LP is infeasible and contraction leaves no new edges.
    let (graph, mut store) = build_graph(
        3,
        &[
            (0, 1, [1.0, 1.0, 0.0]),
            (1, 2, [1.0, 1.0, 0.0]),
            (0, 2, [2.0, 2.0, 0.0]),
        ],
    );
    let edges_before = store.len();

    let mut contractor = Contractor::new(false);
    contractor.contract_completely(&mut store, &graph, 0);
    assert_eq!(store.len(), edges_before);
}

#[test]
fn axis_optimal_alternatives_both_get_shortcuts() {
    // u→v→w is best on length, u→x→w on height: contracting either middle
    // node must produce its shortcut, each justified by its own axis.
    let (graph, store) = build_graph(
        4,
        &[
            (0, 1, [10.0, 0.0, 0.0]),
            (1, 2, [10.0, 0.0, 0.0]),
            (0, 3, [0.0, 10.0, 0.0]),
            (3, 2, [0.0, 10.0, 0.0]),
        ],
    );

    let mut dijkstra = PlainDijkstra::new(&graph);
    let mut stats = ShortcutStats::default();

    let v = graph.node_pos(1).unwrap();
    let via_v = check_edge_pair(
        &mut dijkstra,
        &store,
        &graph.in_edges(v)[0],
        &graph.out_edges(v)[0],
        &mut stats,
    )
    .expect("length-optimal pair needs a shortcut");
    assert_eq!(via_v.cost, Cost::new(20.0, 0.0, 0.0));

    let x = graph.node_pos(3).unwrap();
    let via_x = check_edge_pair(
        &mut dijkstra,
        &store,
        &graph.in_edges(x)[0],
        &graph.out_edges(x)[0],
        &mut stats,
    )
    .expect("height-optimal pair needs a shortcut");
    assert_eq!(via_x.cost, Cost::new(0.0, 20.0, 0.0));
}

#[test]
fn trade_off_graph_answers_axis_queries_after_contraction() {
    let (graph, mut store) = build_graph(
        4,
        &[
            (0, 1, [10.0, 0.0, 0.0]),
            (1, 2, [10.0, 0.0, 0.0]),
            (0, 3, [0.0, 10.0, 0.0]),
            (3, 2, [0.0, 10.0, 0.0]),
        ],
    );

    let mut contractor = Contractor::new(false);
    let merged = contractor.contract_completely(&mut store, &graph, 0);

    let mut ch = ChDijkstra::new(&merged, &store);
    let from = merged.node_pos(0).unwrap();
    let to = merged.node_pos(2).unwrap();

    let shortest = ch.find_best_route(from, to, &Config::axis(0)).unwrap();
    assert_eq!(shortest.costs, Cost::new(0.0, 20.0, 0.0));
    let flattest = ch.find_best_route(from, to, &Config::axis(1)).unwrap();
    assert_eq!(flattest.costs, Cost::new(20.0, 0.0, 0.0));
}

#[test]
fn ring_contraction_nests_shortcuts_and_preserves_routes() {
    // A directed ring keeps every interior node's only detour alive, so
    // each round spans the contracted node with a (possibly nested)
    // shortcut.
    let ring = [
        (0u32, 1u32, [1.0, 2.0, 0.0]),
        (1, 2, [2.0, 1.0, 1.0]),
        (2, 3, [1.0, 1.0, 2.0]),
        (3, 4, [3.0, 0.0, 1.0]),
        (4, 5, [1.0, 1.0, 0.0]),
        (5, 0, [2.0, 2.0, 1.0]),
    ];
    let (graph, mut store) = build_graph(6, &ring);

    let mut contractor = Contractor::new(false);
    let merged = contractor.contract_completely(&mut store, &graph, 0);

    assert!(
        store.edges().iter().any(|edge| edge.is_shortcut()),
        "ring contraction must produce shortcuts"
    );

    // Every pair is connected by exactly one simple path; the hierarchy
    // must reproduce it, unpacked to primitive edges.
    let mut ch = ChDijkstra::new(&merged, &store);
    let mut plain = PlainDijkstra::new(&graph);
    for from_id in 0..6u32 {
        for to_id in 0..6u32 {
            if from_id == to_id {
                continue;
            }
            let expected = plain
                .best_route(
                    graph.node_pos(from_id).unwrap(),
                    graph.node_pos(to_id).unwrap(),
                    &Config::uniform(),
                )
                .unwrap();
            let actual = ch
                .find_best_route(
                    merged.node_pos(from_id).unwrap(),
                    merged.node_pos(to_id).unwrap(),
                    &Config::uniform(),
                )
                .unwrap();
            assert_eq!(actual.edges, expected.edges, "route {from_id}→{to_id}");
            assert_eq!(actual.costs, expected.costs);
        }
    }
}

#[test]
fn contraction_is_idempotent() {
    let ring = [
        (0u32, 1u32, [1.0, 0.0, 1.0]),
        (1, 2, [2.0, 1.0, 0.0]),
        (2, 3, [1.0, 2.0, 1.0]),
        (3, 0, [2.0, 0.0, 2.0]),
    ];
    let (graph, mut store) = build_graph(4, &ring);

    let mut contractor = Contractor::new(false);
    let merged = contractor.contract_completely(&mut store, &graph, 0);
    let edges_after_first = store.len();
    assert!(edges_after_first > ring.len(), "first pass creates shortcuts");

    let mut again = Contractor::new(false);
    again.contract_completely(&mut store, &merged, 0);
    assert_eq!(store.len(), edges_after_first, "second pass must add nothing");
}

#[test]
fn shortcut_costs_equal_their_children() {
    let ring = [
        (0u32, 1u32, [1.0, 2.0, 0.0]),
        (1, 2, [2.0, 1.0, 1.0]),
        (2, 3, [1.0, 1.0, 2.0]),
        (3, 4, [3.0, 0.0, 1.0]),
        (4, 0, [1.0, 1.0, 0.0]),
    ];
    let (graph, mut store) = build_graph(5, &ring);

    let mut contractor = Contractor::new(false);
    contractor.contract_completely(&mut store, &graph, 0);

    for edge in store.edges() {
        if let Some((a, b)) = edge.skip {
            let summed = store.get(a).cost + store.get(b).cost;
            assert_eq!(edge.cost, summed, "shortcut {} must sum its children", edge.id);

            let unpacked_sum = unpack_edge(&store, edge.id)
                .iter()
                .fold(Cost::default(), |acc, &id| acc + store.get(id).cost);
            assert_eq!(edge.cost, unpacked_sum, "unpacking shortcut {} must round-trip", edge.id);
        }
    }
}

#[test]
fn merged_hierarchy_keeps_every_node_and_edge() {
    let ring = [
        (0u32, 1u32, [1.0, 0.0, 0.0]),
        (1, 2, [1.0, 1.0, 0.0]),
        (2, 3, [1.0, 0.0, 1.0]),
        (3, 0, [1.0, 1.0, 1.0]),
    ];
    let (graph, mut store) = build_graph(4, &ring);

    let mut contractor = Contractor::new(false);
    let merged = contractor.contract_completely(&mut store, &graph, 0);

    assert_eq!(merged.node_count(), graph.node_count());
    assert!(merged.edge_count() >= graph.edge_count());
    for id in 0..graph.edge_count() {
        assert!(merged.edge_ids().contains(&id));
    }

    let levels: std::collections::BTreeSet<u32> =
        (0..merged.node_count()).map(|pos| merged.level_of(pos)).collect();
    assert!(levels.len() >= 2, "contraction must assign distinct levels");
}
