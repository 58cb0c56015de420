//! Velo routing core
//!
//! Multi-criteria route planning for bicycle networks. Edges carry a vector
//! of incommensurable costs (length, climb, unsuitability); queries collapse
//! it with a weight vector on the simplex. The pipeline:
//!
//! - Contraction: build a node hierarchy whose shortcut edges provably
//!   preserve optimal routes under *every* admissible weight vector.
//! - Query: bidirectional upward search with stall-on-demand over the
//!   hierarchy, parametrized by the weight vector at query time.
//! - Enumeration: walk the convex hull of discovered cost vectors to
//!   collect a bounded set of pairwise-dissimilar Pareto-optimal routes,
//!   each with the weight vector that justifies it.

pub mod ch;
pub mod contraction;
pub mod cost;
pub mod dijkstra;
pub mod enumerate;
pub mod graph;
pub mod hull;
pub mod io;
pub mod lp;
pub mod routes;

pub use ch::ChDijkstra;
pub use contraction::Contractor;
pub use cost::{Config, Cost, EDGE_COST_DIMENSION};
pub use dijkstra::{PlainDijkstra, RouteWithCount};
pub use enumerate::EnumerateOptimals;
pub use graph::{Edge, EdgeId, EdgeStore, Graph, HalfEdge, Node, NodeId, NodePos};
pub use routes::{calculate_sharing, frechet_distance, EdgeLoads, Route};
