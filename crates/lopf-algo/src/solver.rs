//! Lowering of the symbolic [`Model`] into Clarabel's conic form and
//! solution decoding.
//!
//! Clarabel solves
//!
//! ```text
//! minimize    (1/2) x'Px + q'x
//! subject to  Ax + s = b,   s in K
//! ```
//!
//! An LP needs `P = 0`, Zero cones for equality rows and Nonnegative
//! cones for inequality and bound rows. Rows are emitted in
//! constraint registration order with consecutive same-type cones
//! merged, followed by one Nonnegative block for the finite variable
//! bounds. The A matrix is accumulated column-wise and sorted into
//! CSC at the end.
//!
//! Duals are reported per [`ConId`] as the sensitivity of the
//! objective to the constraint's right-hand side, which for the
//! balance equalities is exactly the nodal marginal price. Clarabel's
//! `z` multipliers satisfy `q + A'z = 0`, so the reported value is
//! `-z` for rows emitted as written and `+z` for `>=` rows (they are
//! negated into `<=` form during lowering).

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use serde::Serialize;
use tracing::debug;

use crate::algebra::{ConId, Model, Sense, VarId};
use crate::error::LopfError;

/// Options forwarded to the interior-point solver.
#[derive(Debug, Clone, Default)]
pub struct SolverOptions {
    /// Print solver iterations.
    pub verbose: bool,
    /// Iteration cap; solver default if `None`.
    pub max_iter: Option<u32>,
    /// Feasibility tolerance; solver default if `None`.
    pub tol_feas: Option<f64>,
}

/// Outcome classification of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    /// Converged to optimality.
    Optimal,
    /// Near-converged; results are usable but carry a warning.
    SubOptimal,
}

/// Primal/dual solution decoded back onto model handles.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    /// Solver termination status, verbatim.
    pub termination: String,
    /// Objective value including the model constant.
    pub objective: f64,
    pub iterations: u32,
    primal: Vec<f64>,
    dual: Vec<f64>,
}

impl Solution {
    pub fn value(&self, var: VarId) -> f64 {
        self.primal[var.value()]
    }

    /// d(objective) / d(rhs) of the constraint as registered.
    pub fn dual(&self, con: ConId) -> f64 {
        self.dual[con.value()]
    }
}

/// The lowered problem: CSC matrices plus the row bookkeeping needed
/// to map solver vectors back onto model handles. Once compiled, the
/// symbolic model is no longer required for solving.
pub struct CompiledProblem {
    n_vars: usize,
    objective_constant: f64,
    q: Vec<f64>,
    a_cols: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
    /// Row of each constraint in A.
    con_rows: Vec<usize>,
    /// +1/-1 factor mapping Clarabel's z back to d(obj)/d(rhs).
    dual_signs: Vec<f64>,
}

/// Lower a model into Clarabel's `Ax + s = b, s in K` form.
pub fn compile(model: &Model) -> CompiledProblem {
    let n_vars = model.n_vars();
    let mut a_cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_vars];
    let mut rhs: Vec<f64> = Vec::new();
    let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
    let mut con_rows = Vec::with_capacity(model.n_cons());
    let mut dual_signs = Vec::with_capacity(model.n_cons());

    for (terms, sense, k) in model.constraints() {
        let row = rhs.len();
        con_rows.push(row);

        // ">=" rows are negated into "<=" form; their multiplier
        // comes back with the opposite sign.
        let (flip, dual_sign) = match sense {
            Sense::Eq | Sense::Leq => (1.0, -1.0),
            Sense::Geq => (-1.0, 1.0),
        };
        dual_signs.push(dual_sign);

        for &(c, v) in terms {
            a_cols[v.value()].push((row, flip * c));
        }
        rhs.push(flip * k);

        // Merge consecutive rows of the same cone type.
        match sense {
            Sense::Eq => match cones.last_mut() {
                Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
                _ => cones.push(SupportedConeT::ZeroConeT(1)),
            },
            Sense::Leq | Sense::Geq => match cones.last_mut() {
                Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
                _ => cones.push(SupportedConeT::NonnegativeConeT(1)),
            },
        }
    }

    // Finite variable bounds as one Nonnegative block.
    let mut n_bound_rows = 0;
    for (col, (lower, upper)) in model.var_bounds().enumerate() {
        if upper.is_finite() {
            let row = rhs.len();
            a_cols[col].push((row, 1.0));
            rhs.push(upper);
            n_bound_rows += 1;
        }
        if lower.is_finite() {
            let row = rhs.len();
            a_cols[col].push((row, -1.0));
            rhs.push(-lower);
            n_bound_rows += 1;
        }
    }
    if n_bound_rows > 0 {
        match cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += n_bound_rows,
            _ => cones.push(SupportedConeT::NonnegativeConeT(n_bound_rows)),
        }
    }

    // Linear objective vector.
    let objective = model.objective_terms();
    let mut q = vec![0.0; n_vars];
    for &(c, v) in &objective.terms {
        q[v.value()] += c;
    }

    CompiledProblem {
        n_vars,
        objective_constant: objective.constant,
        q,
        a_cols,
        rhs,
        cones,
        con_rows,
        dual_signs,
    }
}

impl CompiledProblem {
    pub fn n_rows(&self) -> usize {
        self.rhs.len()
    }

    /// Run the interior-point solver and decode the solution.
    pub fn solve(mut self, options: &SolverOptions) -> Result<Solution, LopfError> {
        let n_rows = self.rhs.len();

        // Column-wise triplets -> CSC: sort each column by row index
        // and concatenate.
        let mut col_ptr = Vec::with_capacity(self.n_vars + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        let mut nnz = 0;
        let mut cols = std::mem::take(&mut self.a_cols);
        for col in cols.iter_mut() {
            col_ptr.push(nnz);
            col.sort_by_key(|&(r, _)| r);
            for &(r, v) in col.iter() {
                row_idx.push(r);
                values.push(v);
                nnz += 1;
            }
        }
        col_ptr.push(nnz);

        let a_mat = CscMatrix::new(n_rows, self.n_vars, col_ptr, row_idx, values);
        // Zero quadratic term: this is a pure LP.
        let p_mat = CscMatrix::new(
            self.n_vars,
            self.n_vars,
            vec![0; self.n_vars + 1],
            Vec::new(),
            Vec::new(),
        );

        let mut settings = DefaultSettingsBuilder::<f64>::default();
        settings.verbose(options.verbose);
        if let Some(max_iter) = options.max_iter {
            settings.max_iter(max_iter);
        }
        if let Some(tol) = options.tol_feas {
            settings.tol_feas(tol);
        }
        let settings = settings
            .build()
            .map_err(|e| LopfError::Solver(format!("settings error: {e:?}")))?;

        let mut solver =
            DefaultSolver::new(&p_mat, &self.q, &a_mat, &self.rhs, &self.cones, settings)
                .map_err(|e| LopfError::Solver(format!("solver initialisation failed: {e:?}")))?;

        solver.solve();
        let sol = solver.solution;
        debug!(status = ?sol.status, iterations = sol.iterations, "solver finished");

        let status = match sol.status {
            SolverStatus::Solved => SolveStatus::Optimal,
            SolverStatus::AlmostSolved => SolveStatus::SubOptimal,
            other => {
                return Err(LopfError::Infeasible {
                    status: format!("{other:?}"),
                })
            }
        };

        let dual = self
            .con_rows
            .iter()
            .zip(&self.dual_signs)
            .map(|(&row, &sign)| sign * sol.z[row])
            .collect();

        Ok(Solution {
            status,
            termination: format!("{:?}", sol.status),
            objective: sol.obj_val + self.objective_constant,
            iterations: sol.iterations,
            primal: sol.x,
            dual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::LinExpr;

    /// Two-bus toy problem: one generator, a 50 MW demand behind a
    /// line of susceptance 10.
    fn two_bus_model() -> (Model, VarId, VarId, ConId, ConId) {
        let mut model = Model::new();
        let p_gen = model.add_var("p_gen".into(), 0.0, 100.0);
        let theta = model.add_var("theta".into(), -10.0, 10.0);

        // p_gen = -10 theta (balance at the generator bus)
        let mut lhs = LinExpr::term(1.0, p_gen);
        lhs.add_term(10.0, theta);
        let c0 = model.add_constraint("bal0".into(), lhs, Sense::Eq, LinExpr::new());

        // 10 theta = -50 (balance at the load bus)
        let c1 = model.add_constraint(
            "bal1".into(),
            LinExpr::term(10.0, theta),
            Sense::Eq,
            LinExpr::constant_expr(-50.0),
        );

        model.set_objective(LinExpr::term(10.0, p_gen));
        (model, p_gen, theta, c0, c1)
    }

    #[test]
    fn test_lp_primal_solution() {
        let (model, p_gen, theta, _, _) = two_bus_model();
        let solution = compile(&model).solve(&SolverOptions::default()).unwrap();

        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.value(p_gen) - 50.0).abs() < 1e-5);
        assert!((solution.value(theta) + 5.0).abs() < 1e-5);
        assert!((solution.objective - 500.0).abs() < 1e-4);
    }

    #[test]
    fn test_lp_dual_signs() {
        let (model, _, _, c0, c1) = two_bus_model();
        let solution = compile(&model).solve(&SolverOptions::default()).unwrap();

        // Raising bal0's rhs by one displaces one MW of generation
        // through p_gen = k0 - 10 theta: cost +10. Raising bal1's rhs
        // by one reduces the demand seen by the generator: cost -10.
        assert!((solution.dual(c0) - 10.0).abs() < 1e-4);
        assert!((solution.dual(c1) + 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_geq_dual_sign() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, f64::INFINITY);
        let c = model.add_constraint(
            "floor".into(),
            LinExpr::term(1.0, x),
            Sense::Geq,
            LinExpr::constant_expr(3.0),
        );
        model.set_objective(LinExpr::term(2.0, x));

        let solution = compile(&model).solve(&SolverOptions::default()).unwrap();
        assert!((solution.value(x) - 3.0).abs() < 1e-6);
        // Tightening the floor by one costs 2.
        assert!((solution.dual(c) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_objective_constant_reported() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 1.0, 5.0);
        let mut obj = LinExpr::term(3.0, x);
        obj.add_constant(-2.0);
        model.set_objective(obj);

        let solution = compile(&model).solve(&SolverOptions::default()).unwrap();
        assert!((solution.objective - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_infeasible_reported() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, f64::INFINITY);
        model.add_constraint(
            "hi".into(),
            LinExpr::term(1.0, x),
            Sense::Leq,
            LinExpr::constant_expr(1.0),
        );
        model.add_constraint(
            "lo".into(),
            LinExpr::term(1.0, x),
            Sense::Geq,
            LinExpr::constant_expr(2.0),
        );
        model.set_objective(LinExpr::term(1.0, x));

        let err = compile(&model).solve(&SolverOptions::default()).unwrap_err();
        assert!(matches!(err, LopfError::Infeasible { .. }));
    }
}
