//! Small dense linear programs
//!
//! Two LPs drive the planner. The contraction workers search the weight
//! simplex for a point making a candidate shortcut uniquely optimal; every
//! witness path cuts off the halfspace where the witness wins. The
//! enumerator asks, per hull cell, for the weight vector on which all cell
//! vertices project to the same scalar (the cell's normal direction in
//! cost space). Infeasibility is meaningful in both cases and is returned
//! as a value.

use minilp::{ComparisonOp, OptimizationDirection, Problem};
use velo_common::LpError;

use crate::cost::{Config, EDGE_COST_DIMENSION};

/// Weights may not vanish entirely: the simplex is kept open by this lower
/// bound, as in the original contraction setup.
const ALPHA_MIN: f64 = 0.001;

/// Strict witness constraints demand dominance by this margin. A plain
/// `≤ 0` row would stay feasible when a witness ties the shortcut cost
/// exactly, committing shortcuts that are never uniquely optimal (and
/// re-contracting already-contracted graphs endlessly).
const WITNESS_SLACK: f64 = 1e-6;

/// Feasibility search for a shortcut: does any admissible weight vector
/// make the shortcut path the unique optimum? Whether a witness row is
/// strict follows the tie-break of the cost model: a witness with fewer
/// edges than the shortcut path wins dot-product ties, a longer one loses
/// them.
#[derive(Debug, Default)]
pub struct ShortcutLp {
    constraints: Vec<([f64; EDGE_COST_DIMENSION], bool)>,
}

impl ShortcutLp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a witness row, `coeffs` being the shortcut cost minus the
    /// witness cost: `coeffs·α ≤ −slack` when `strict`, `coeffs·α ≤ 0`
    /// when the shortcut path wins ties against this witness.
    pub fn add_constraint(&mut self, coeffs: [f64; EDGE_COST_DIMENSION], strict: bool) {
        self.constraints.push((coeffs, strict));
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// A feasible weight vector, or `Err(Infeasible)` proving that no
    /// admissible weights let the shortcut win against every witness.
    pub fn solve(&self) -> Result<Config, LpError> {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let alphas: Vec<_> = (0..EDGE_COST_DIMENSION)
            .map(|_| problem.add_var(1.0, (ALPHA_MIN, 1.0)))
            .collect();

        let convexity: Vec<_> = alphas.iter().map(|&alpha| (alpha, 1.0)).collect();
        problem.add_constraint(convexity.as_slice(), ComparisonOp::Eq, 1.0);

        for (coeffs, strict) in &self.constraints {
            let row: Vec<_> = alphas.iter().copied().zip(coeffs.iter().copied()).collect();
            let bound = if *strict { -WITNESS_SLACK } else { 0.0 };
            problem.add_constraint(row.as_slice(), ComparisonOp::Le, bound);
        }

        let solution = problem.solve().map_err(lp_error)?;
        let mut values = [0.0; EDGE_COST_DIMENSION];
        for (value, &alpha) in values.iter_mut().zip(alphas.iter()) {
            *value = solution[alpha];
        }
        Ok(Config(values))
    }
}

/// Weight vector on which all given cost points project equally: minimize V
/// subject to `point·α = V`, `Σα = 1`, `α ∈ [0,1]`, `V ≥ 0`.
pub fn cell_config(points: &[[f64; EDGE_COST_DIMENSION]]) -> Result<Config, LpError> {
    let mut problem = Problem::new(OptimizationDirection::Minimize);
    let alphas: Vec<_> = (0..EDGE_COST_DIMENSION)
        .map(|_| problem.add_var(0.0, (0.0, 1.0)))
        .collect();
    let v = problem.add_var(1.0, (0.0, f64::INFINITY));

    for point in points {
        let mut row: Vec<_> = alphas.iter().copied().zip(point.iter().copied()).collect();
        row.push((v, -1.0));
        problem.add_constraint(row.as_slice(), ComparisonOp::Eq, 0.0);
    }

    let convexity: Vec<_> = alphas.iter().map(|&alpha| (alpha, 1.0)).collect();
    problem.add_constraint(convexity.as_slice(), ComparisonOp::Eq, 1.0);

    let solution = problem.solve().map_err(lp_error)?;
    let mut values = [0.0; EDGE_COST_DIMENSION];
    for (value, &alpha) in values.iter_mut().zip(alphas.iter()) {
        *value = solution[alpha];
    }
    Ok(Config(values))
}

fn lp_error(err: minilp::Error) -> LpError {
    match err {
        minilp::Error::Infeasible => LpError::Infeasible,
        minilp::Error::Unbounded => LpError::Unbounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_shortcut_lp_is_feasible() {
        let lp = ShortcutLp::new();
        let config = lp.solve().unwrap();
        let sum: f64 = config.0.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(config.0.iter().all(|&alpha| alpha >= ALPHA_MIN - 1e-12));
    }

    #[test]
    fn tied_strict_witness_makes_lp_infeasible() {
        // A shorter witness with the same cost vector as the shortcut: no
        // weights can ever make the shortcut strictly better.
        let mut lp = ShortcutLp::new();
        lp.add_constraint([0.0, 0.0, 0.0], true);
        assert_eq!(lp.solve(), Err(LpError::Infeasible));
    }

    #[test]
    fn tied_longer_witness_stays_feasible() {
        // A longer witness with the same cost vector loses the tie to the
        // shortcut path; the row is non-strict and cuts nothing off.
        let mut lp = ShortcutLp::new();
        lp.add_constraint([0.0, 0.0, 0.0], false);
        assert!(lp.solve().is_ok());
    }

    #[test]
    fn separable_witness_moves_the_weights() {
        // Shortcut costs (20, 0, 0), witness costs (0, 20, 0): feasible,
        // but only where the second metric carries enough weight.
        let mut lp = ShortcutLp::new();
        lp.add_constraint([20.0, -20.0, 0.0], true);
        let config = lp.solve().unwrap();
        assert!(config[1] > config[0]);
    }

    #[test]
    fn contradictory_witnesses_are_infeasible() {
        let mut lp = ShortcutLp::new();
        lp.add_constraint([1.0, 1.0, 1.0], true);
        assert_eq!(lp.solve(), Err(LpError::Infeasible));
    }

    #[test]
    fn cell_config_of_symmetric_points_is_uniform() {
        let config = cell_config(&[[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]).unwrap();
        for alpha in config.0 {
            assert!((alpha - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn cell_config_detects_dead_cells() {
        // An upper-hull facet: equal projection would need a negative
        // weight, so the cell proposes nothing.
        let result = cell_config(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 1.0]]);
        assert_eq!(result, Err(LpError::Infeasible));
    }
}
