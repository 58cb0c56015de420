//! velo-route: command line and HTTP surface of the route planner
//!
//! The heavy lifting lives in `velo-routing`; this crate wires loaders,
//! contraction, persistence and the query server together.

pub mod cli;
pub mod server;

pub use cli::Cli;
