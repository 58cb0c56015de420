//! Common error types for the velo routing toolkit

pub mod error;

pub use error::{GraphError, LpError, Result};
