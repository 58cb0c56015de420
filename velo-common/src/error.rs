//! Error types shared across the velo crates
//!
//! Input validation failures are fatal and surfaced to the caller; an
//! infeasible linear program is an expected signal, not a failure. A query
//! that finds no route is a value (`None`/empty), never an error.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while loading or assembling a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed input line; reported with file and line context.
    #[error("{}:{line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// Costs must be non-negative for every metric.
    #[error("{}:{line}: negative cost component {value}", file.display())]
    NegativeCost {
        file: PathBuf,
        line: usize,
        value: f64,
    },

    /// An edge connecting a node to itself violates the graph invariant.
    #[error("edge connects node {node} to itself")]
    LoopEdge { node: u32 },

    /// `graph` and `ch_graph` of a multi-file hierarchy must agree.
    #[error("node counts of graph ({graph}) and ch_graph ({ch_graph}) do not match")]
    NodeCountMismatch { graph: usize, ch_graph: usize },

    #[error("binary graph dump is corrupt: {0}")]
    BinaryFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of a small dense linear program.
///
/// `Infeasible` carries algorithmic meaning: during a shortcut necessity
/// check it proves the shortcut unnecessary, during hull-cell exploration it
/// marks the cell dead. Callers recover locally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LpError {
    #[error("linear program is infeasible")]
    Infeasible,

    #[error("linear program is unbounded")]
    Unbounded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_context() {
        let err = GraphError::Parse {
            file: PathBuf::from("graph.txt"),
            line: 17,
            message: "expected 7 fields".into(),
        };
        assert_eq!(err.to_string(), "graph.txt:17: expected 7 fields");
    }

    #[test]
    fn lp_infeasible_is_comparable() {
        assert_eq!(LpError::Infeasible, LpError::Infeasible);
        assert_ne!(LpError::Infeasible, LpError::Unbounded);
    }
}
