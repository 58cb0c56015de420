//! Graph store: level-sorted nodes, append-only edge table, CSR adjacency
//!
//! Nodes are kept sorted by contraction level (ascending, stable), so a
//! node's position changes between contraction rounds while its id stays
//! stable. Edges live in an append-only [`EdgeStore`] addressed by
//! monotonically growing ids; a shortcut references the two edges it
//! replaces by id, which makes the shortcut forest acyclic by construction.
//!
//! Adjacency is stored CSR-style as two half-edge arrays (outgoing and
//! incoming) with per-node offsets. Half-edges are sorted by descending
//! level of the far endpoint, so hierarchy-aware searches can stop scanning
//! as soon as the level drops below their own.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cost::Cost;

pub type NodeId = u32;
pub type NodePos = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub osm_id: u64,
    pub lat: f64,
    pub lng: f64,
    pub height: f64,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub dest: NodeId,
    pub cost: Cost,
    /// For a shortcut: the two replaced child edges, in path order.
    pub skip: Option<(EdgeId, EdgeId)>,
}

impl Edge {
    pub fn is_shortcut(&self) -> bool {
        self.skip.is_some()
    }
}

/// A shortcut produced by a contraction worker, before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoShortcut {
    pub source: NodeId,
    pub dest: NodeId,
    pub cost: Cost,
    pub skip: (EdgeId, EdgeId),
}

/// Append-only edge table. Ids are assigned once and never reused; the
/// contraction coordinator is the only writer, and only between rounds.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EdgeStore {
    edges: Vec<Edge>,
}

impl EdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Appends a primitive or pre-resolved edge and returns its id.
    pub fn push(
        &mut self,
        source: NodeId,
        dest: NodeId,
        cost: Cost,
        skip: Option<(EdgeId, EdgeId)>,
    ) -> EdgeId {
        let id = self.edges.len();
        if let Some((a, b)) = skip {
            if a >= id || b >= id {
                // Legacy behavior: report the desynchronized reference and
                // keep the edge as primitive.
                warn!(edge = id, skip_a = a, skip_b = b, "skip references unknown edges");
                self.edges.push(Edge { id, source, dest, cost, skip: None });
                return id;
            }
        }
        self.edges.push(Edge { id, source, dest, cost, skip });
        id
    }

    /// Assigns ids to freshly created shortcuts, single-threaded, after all
    /// workers of a contraction round have reported back.
    pub fn administer(&mut self, shortcuts: Vec<ProtoShortcut>) -> Vec<EdgeId> {
        let mut ids = Vec::with_capacity(shortcuts.len());
        for shortcut in shortcuts {
            ids.push(self.push(
                shortcut.source,
                shortcut.dest,
                shortcut.cost,
                Some(shortcut.skip),
            ));
        }
        ids
    }

    /// Rebuilds a store from a deserialized edge table.
    pub(crate) fn from_edges(edges: Vec<Edge>) -> Self {
        for (pos, edge) in edges.iter().enumerate() {
            if edge.id != pos {
                warn!(expected = pos, found = edge.id, "edge ids desynchronized");
            }
        }
        Self { edges }
    }
}

/// Half of a directed edge as seen from one endpoint. `end` is the far
/// endpoint: the destination for outgoing half-edges, the source for
/// incoming ones. The cost is inlined so relaxation needs no indirection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfEdge {
    pub id: EdgeId,
    pub begin: NodePos,
    pub end: NodePos,
    pub cost: Cost,
}

#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    level: Vec<u32>,
    edge_ids: Vec<EdgeId>,
    out_edges: Vec<HalfEdge>,
    in_edges: Vec<HalfEdge>,
    out_offsets: Vec<usize>,
    in_offsets: Vec<usize>,
    pos_by_id: rustc_hash::FxHashMap<NodeId, NodePos>,
}

impl Graph {
    pub fn new(mut nodes: Vec<Node>, edge_ids: Vec<EdgeId>, store: &EdgeStore) -> Graph {
        nodes.sort_by_key(|node| node.level);

        let mut pos_by_id = rustc_hash::FxHashMap::default();
        pos_by_id.reserve(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            pos_by_id.insert(node.id, pos);
        }
        let level: Vec<u32> = nodes.iter().map(|node| node.level).collect();

        let mut out_edges = Vec::with_capacity(edge_ids.len());
        let mut in_edges = Vec::with_capacity(edge_ids.len());
        for &id in &edge_ids {
            let edge = store.get(id);
            let source_pos = pos_by_id[&edge.source];
            let dest_pos = pos_by_id[&edge.dest];
            out_edges.push(HalfEdge { id, begin: source_pos, end: dest_pos, cost: edge.cost });
            in_edges.push(HalfEdge { id, begin: dest_pos, end: source_pos, cost: edge.cost });
        }
        sort_half_edges(&mut out_edges, &level);
        sort_half_edges(&mut in_edges, &level);
        let out_offsets = build_offsets(&out_edges, nodes.len());
        let in_offsets = build_offsets(&in_edges, nodes.len());

        Graph {
            nodes,
            level,
            edge_ids,
            out_edges,
            in_edges,
            out_offsets,
            in_offsets,
            pos_by_id,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_ids.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, pos: NodePos) -> &Node {
        &self.nodes[pos]
    }

    pub fn node_pos(&self, id: NodeId) -> Option<NodePos> {
        self.pos_by_id.get(&id).copied()
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.node_pos(id).map(|pos| self.node(pos))
    }

    pub fn level_of(&self, pos: NodePos) -> u32 {
        self.level[pos]
    }

    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    /// Outgoing half-edges of `pos`, highest far-endpoint level first.
    pub fn out_edges(&self, pos: NodePos) -> &[HalfEdge] {
        &self.out_edges[self.out_offsets[pos]..self.out_offsets[pos + 1]]
    }

    /// Incoming half-edges of `pos`, highest far-endpoint level first.
    pub fn in_edges(&self, pos: NodePos) -> &[HalfEdge] {
        &self.in_edges[self.in_offsets[pos]..self.in_offsets[pos + 1]]
    }

    /// Workload estimate used to schedule contraction jobs.
    pub fn in_times_out_degree(&self, pos: NodePos) -> usize {
        self.in_edges(pos).len() * self.out_edges(pos).len()
    }
}

fn sort_half_edges(edges: &mut [HalfEdge], level: &[u32]) {
    edges.sort_by(|a, b| {
        a.begin
            .cmp(&b.begin)
            .then_with(|| level[b.end].cmp(&level[a.end]))
            .then_with(|| a.end.cmp(&b.end))
    });
}

fn build_offsets(edges: &[HalfEdge], node_count: usize) -> Vec<usize> {
    let mut offsets = vec![0; node_count + 1];
    for edge in edges {
        offsets[edge.begin + 1] += 1;
    }
    for i in 1..=node_count {
        offsets[i] += offsets[i - 1];
    }
    offsets
}
