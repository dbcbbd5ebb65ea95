//! Symbolic linear expressions and the flat LP model store.
//!
//! Declarators build [`LinExpr`]s term by term and register them as
//! named constraints on a [`Model`]. Registration normalizes each
//! constraint to `sum c_i x_i <=/==/>= k` (right-hand side subtracted,
//! duplicate variable terms consolidated, constants folded into `k`),
//! which is the form the solver lowering consumes.
//!
//! Names follow the `family(i1,i2,...)` convention and exist for the
//! LP dump and diagnostics only; all hot-path lookups go through the
//! integer [`VarId`]/[`ConId`] handles.

use serde::Serialize;
use std::io::{self, Write};

/// Handle of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VarId(usize);

/// Handle of a registered constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConId(usize);

impl VarId {
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl ConId {
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Constraint sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sense {
    Leq,
    Eq,
    Geq,
}

impl std::fmt::Display for Sense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sense::Leq => write!(f, "<="),
            Sense::Eq => write!(f, "="),
            Sense::Geq => write!(f, ">="),
        }
    }
}

/// A sparse linear expression `sum c_i x_i + constant`.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub terms: Vec<(f64, VarId)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            terms: Vec::with_capacity(n),
            constant: 0.0,
        }
    }

    /// Single-term expression `coeff * var`.
    pub fn term(coeff: f64, var: VarId) -> Self {
        Self {
            terms: vec![(coeff, var)],
            constant: 0.0,
        }
    }

    /// Constant-only expression.
    pub fn constant_expr(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    #[inline]
    pub fn add_term(&mut self, coeff: f64, var: VarId) {
        self.terms.push((coeff, var));
    }

    #[inline]
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Append `factor * other` (terms and constant).
    pub fn add_scaled(&mut self, factor: f64, other: &LinExpr) {
        self.terms
            .extend(other.terms.iter().map(|&(c, v)| (factor * c, v)));
        self.constant += factor * other.constant;
    }

    /// Append `other` unscaled.
    pub fn extend(&mut self, other: &LinExpr) {
        self.terms.extend_from_slice(&other.terms);
        self.constant += other.constant;
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.constant == 0.0
    }

    /// Merge duplicate variables and drop zero coefficients.
    fn consolidate(&mut self) {
        if self.terms.len() > 1 {
            self.terms.sort_unstable_by_key(|&(_, v)| v.value());
            let mut out: Vec<(f64, VarId)> = Vec::with_capacity(self.terms.len());
            for &(c, v) in &self.terms {
                match out.last_mut() {
                    Some((acc, last)) if *last == v => *acc += c,
                    _ => out.push((c, v)),
                }
            }
            self.terms = out;
        }
        self.terms.retain(|&(c, _)| c != 0.0);
    }
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    lower: f64,
    upper: f64,
}

#[derive(Debug, Clone)]
struct Constraint {
    name: String,
    terms: Vec<(f64, VarId)>,
    sense: Sense,
    rhs: f64,
}

/// Flat store of named, indexed variables, constraints and the
/// objective. Created fresh per solve, mutated only during build.
#[derive(Debug, Clone, Default)]
pub struct Model {
    vars: Vec<Variable>,
    cons: Vec<Constraint>,
    objective: LinExpr,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the variable table (element counts are known up
    /// front).
    pub fn reserve_vars(&mut self, additional: usize) {
        self.vars.reserve(additional);
    }

    /// Declare a variable; unbounded sides are `f64::NEG_INFINITY` /
    /// `f64::INFINITY`. A non-negative domain is `lower = 0.0`.
    pub fn add_var(&mut self, name: String, lower: f64, upper: f64) -> VarId {
        self.vars.push(Variable { name, lower, upper });
        VarId(self.vars.len() - 1)
    }

    /// Register `lhs sense rhs`, normalized to `terms sense k`.
    pub fn add_constraint(
        &mut self,
        name: String,
        lhs: LinExpr,
        sense: Sense,
        rhs: LinExpr,
    ) -> ConId {
        let mut expr = lhs;
        expr.terms
            .extend(rhs.terms.iter().map(|&(c, v)| (-c, v)));
        let k = rhs.constant - expr.constant;
        expr.constant = 0.0;
        expr.consolidate();
        self.cons.push(Constraint {
            name,
            terms: expr.terms,
            sense,
            rhs: k,
        });
        ConId(self.cons.len() - 1)
    }

    pub fn set_objective(&mut self, mut objective: LinExpr) {
        objective.consolidate();
        self.objective = objective;
    }

    /// Merge additional cost terms into the objective (used by the
    /// extra-functionality hook).
    pub fn add_to_objective(&mut self, expr: LinExpr) {
        self.objective.extend(&expr);
        self.objective.consolidate();
    }

    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn n_cons(&self) -> usize {
        self.cons.len()
    }

    pub fn bounds(&self, var: VarId) -> (f64, f64) {
        let v = &self.vars[var.value()];
        (v.lower, v.upper)
    }

    pub(crate) fn var_bounds(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.vars.iter().map(|v| (v.lower, v.upper))
    }

    pub(crate) fn constraints(&self) -> impl Iterator<Item = (&[(f64, VarId)], Sense, f64)> + '_ {
        self.cons.iter().map(|c| (c.terms.as_slice(), c.sense, c.rhs))
    }

    pub(crate) fn objective_terms(&self) -> &LinExpr {
        &self.objective
    }

    pub fn objective_constant(&self) -> f64 {
        self.objective.constant
    }

    /// Drop the symbolic term storage. Counts, senses and bounds
    /// survive; call only after the model has been lowered.
    pub fn release_expressions(&mut self) {
        for c in &mut self.cons {
            c.terms = Vec::new();
            c.name = String::new();
        }
        let constant = self.objective.constant;
        self.objective = LinExpr {
            terms: Vec::new(),
            constant,
        };
    }

    /// Dump the model in CPLEX-LP-like text, for debugging.
    pub fn write_lp<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Minimize")?;
        write!(w, " obj:")?;
        for &(c, v) in &self.objective.terms {
            write!(w, " {:+} {}", c, self.vars[v.value()].name)?;
        }
        if self.objective.constant != 0.0 {
            write!(w, " {:+}", self.objective.constant)?;
        }
        writeln!(w)?;

        writeln!(w, "Subject To")?;
        for con in &self.cons {
            write!(w, " {}:", con.name)?;
            for &(c, v) in &con.terms {
                write!(w, " {:+} {}", c, self.vars[v.value()].name)?;
            }
            writeln!(w, " {} {}", con.sense, con.rhs)?;
        }

        writeln!(w, "Bounds")?;
        for var in &self.vars {
            match (var.lower.is_finite(), var.upper.is_finite()) {
                (true, true) => writeln!(w, " {} <= {} <= {}", var.lower, var.name, var.upper)?,
                (true, false) => writeln!(w, " {} >= {}", var.name, var.lower)?,
                (false, true) => writeln!(w, " {} <= {}", var.name, var.upper)?,
                (false, false) => writeln!(w, " {} free", var.name)?,
            }
        }
        writeln!(w, "End")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_normalization() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, 10.0);
        let y = model.add_var("y".into(), f64::NEG_INFINITY, f64::INFINITY);

        // 2x + 3 <= y + 8  ->  2x - y <= 5
        let mut lhs = LinExpr::term(2.0, x);
        lhs.add_constant(3.0);
        let mut rhs = LinExpr::term(1.0, y);
        rhs.add_constant(8.0);
        model.add_constraint("c".into(), lhs, Sense::Leq, rhs);

        let (terms, sense, k) = model.constraints().next().unwrap();
        assert_eq!(sense, Sense::Leq);
        assert_eq!(k, 5.0);
        assert_eq!(terms, &[(2.0, x), (-1.0, y)]);
    }

    #[test]
    fn test_duplicate_terms_consolidated() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, f64::INFINITY);

        // x + 2x - 3x == 1 collapses to an empty lhs
        let mut lhs = LinExpr::term(1.0, x);
        lhs.add_term(2.0, x);
        lhs.add_term(-3.0, x);
        model.add_constraint("c".into(), lhs, Sense::Eq, LinExpr::constant_expr(1.0));

        let (terms, _, k) = model.constraints().next().unwrap();
        assert!(terms.is_empty());
        assert_eq!(k, 1.0);
    }

    #[test]
    fn test_add_scaled() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, 1.0);
        let mut base = LinExpr::term(2.0, x);
        base.add_constant(1.0);

        let mut e = LinExpr::new();
        e.add_scaled(-3.0, &base);
        assert_eq!(e.terms, vec![(-6.0, x)]);
        assert_eq!(e.constant, -3.0);
    }

    #[test]
    fn test_write_lp_smoke() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, 4.0);
        model.add_constraint(
            "cap".into(),
            LinExpr::term(1.0, x),
            Sense::Leq,
            LinExpr::constant_expr(3.0),
        );
        model.set_objective(LinExpr::term(2.0, x));

        let mut out = Vec::new();
        model.write_lp(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Minimize"));
        assert!(text.contains("cap:"));
        assert!(text.contains("0 <= x <= 4"));
    }

    #[test]
    fn test_release_keeps_counts() {
        let mut model = Model::new();
        let x = model.add_var("x".into(), 0.0, 1.0);
        model.add_constraint(
            "c".into(),
            LinExpr::term(1.0, x),
            Sense::Eq,
            LinExpr::new(),
        );
        model.set_objective(LinExpr::term(1.0, x));
        model.release_expressions();
        assert_eq!(model.n_vars(), 1);
        assert_eq!(model.n_cons(), 1);
    }
}
