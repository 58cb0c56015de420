//! Cost algebra: per-edge cost vectors and simplex weight vectors
//!
//! Every edge carries one non-negative scalar per metric (travel length,
//! positive elevation gain, unsuitability). A query collapses the vector to
//! a single scalar via the dot product with a weight vector on the simplex.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, Sub};

/// Number of metrics carried by every edge.
pub const EDGE_COST_DIMENSION: usize = 3;

/// Added to every combined cost so that paths with equal cost vectors order
/// deterministically by edge count (fewer edges wins).
pub const COST_TIE_EPSILON: f64 = f32::EPSILON as f64;

/// Non-negative cost vector of an edge or a route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost(pub [f64; EDGE_COST_DIMENSION]);

impl Cost {
    pub fn new(length: f64, height: f64, unsuitability: f64) -> Self {
        Cost([length, height, unsuitability])
    }

    pub fn length(&self) -> f64 {
        self.0[0]
    }

    pub fn height(&self) -> f64 {
        self.0[1]
    }

    pub fn unsuitability(&self) -> f64 {
        self.0[2]
    }

    /// Collapses the vector under the given weights.
    ///
    /// The result is non-negative for every weight vector on the simplex
    /// because all components are non-negative. The added epsilon makes the
    /// scalar strictly positive, so a path accumulates one epsilon per edge.
    pub fn combine(&self, config: &Config) -> f64 {
        let mut combined = 0.0;
        for (cost, alpha) in self.0.iter().zip(config.0.iter()) {
            combined += cost * alpha;
        }
        debug_assert!(combined >= 0.0, "combined cost must stay non-negative");
        combined + COST_TIE_EPSILON
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, other: Cost) -> Cost {
        let mut values = [0.0; EDGE_COST_DIMENSION];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.0[i] + other.0[i];
        }
        Cost(values)
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, other: Cost) -> Cost {
        let mut values = [0.0; EDGE_COST_DIMENSION];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.0[i] - other.0[i];
        }
        Cost(values)
    }
}

impl Index<usize> for Cost {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

/// Weight vector on the open simplex; the query parameter of every search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config(pub [f64; EDGE_COST_DIMENSION]);

impl Config {
    /// The center of the simplex.
    pub fn uniform() -> Self {
        Config([1.0 / EDGE_COST_DIMENSION as f64; EDGE_COST_DIMENSION])
    }

    /// All weight on one metric.
    pub fn axis(i: usize) -> Self {
        let mut values = [0.0; EDGE_COST_DIMENSION];
        values[i] = 1.0;
        Config(values)
    }

    /// Scales the components to sum to one. Weights must be non-negative and
    /// not all zero.
    pub fn normalized(values: [f64; EDGE_COST_DIMENSION]) -> Self {
        let sum: f64 = values.iter().sum();
        debug_assert!(sum > 0.0, "weights must not be all zero");
        let mut scaled = values;
        for value in &mut scaled {
            *value /= sum;
        }
        Config(scaled)
    }

    /// Component-wise comparison with a tolerance fitting LP solver output.
    pub fn approx_eq(&self, other: &Config) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= 1e-9)
    }
}

impl Index<usize> for Config {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_nonnegative_and_biased() {
        let cost = Cost::new(10.0, 2.0, 5.0);
        let config = Config::uniform();
        let combined = cost.combine(&config);
        assert!(combined > 0.0);
        assert!((combined - (17.0 / 3.0 + COST_TIE_EPSILON)).abs() < 1e-12);

        let zero = Cost::default();
        assert!(zero.combine(&config) > 0.0);
    }

    #[test]
    fn equal_vectors_order_by_edge_count() {
        // A two-edge path and a one-edge path with the same total vector:
        // the one-edge path accumulates one epsilon less and wins.
        let config = Config::uniform();
        let chain = Cost::new(1.0, 1.0, 0.0).combine(&config) + Cost::new(1.0, 1.0, 0.0).combine(&config);
        let direct = Cost::new(2.0, 2.0, 0.0).combine(&config);
        assert!(direct < chain);
    }

    #[test]
    fn normalized_sums_to_one() {
        let config = Config::normalized([2.0, 1.0, 1.0]);
        let sum: f64 = config.0.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((config[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn axis_config_ignores_other_metrics() {
        let config = Config::axis(1);
        let cost = Cost::new(100.0, 3.0, 100.0);
        assert!((cost.combine(&config) - (3.0 + COST_TIE_EPSILON)).abs() < 1e-12);
    }
}
