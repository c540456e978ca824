//! The boundary between the decomposition and an external LP solver.
//!
//! Models are built through [`LpSolver`], which hands out plain [`Var`] and [`Constr`]
//! handles. Dual prices follow the sensitivity convention: the dual of a constraint is the
//! rate of change of the optimal objective per unit increase of its right-hand side.

#[cfg(feature = "gurobi")]
pub mod gurobi;
pub mod highs;

use std::{
    collections::BTreeMap,
    iter::Sum,
    ops::{Add, Mul, Neg, Range, Sub},
};

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[cfg(feature = "gurobi")]
pub use self::gurobi::GurobiSolver;
pub use self::highs::HighsSolver;

/// Handle to a variable of a model
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Var(usize);

/// Handle to a linear constraint of a model
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Constr(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Continuous,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstrSense {
    Less,
    Greater,
    Equal,
}

/// Outcome of a call to [`LpSolver::optimize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Optimal,
    Infeasible,
    Unbounded,
    InfeasibleOrUnbounded,
    /// Anything else the backend may report, e.g. limits being hit
    Other(String),
}

/// Which LP solver library to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Highs,
    Gurobi,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Highs
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Highs => write!(f, "highs"),
            Backend::Gurobi => write!(f, "gurobi"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "highs" => Ok(Backend::Highs),
            "gurobi" => Ok(Backend::Gurobi),
            _ => Err(format!("unknown solver backend `{s}`, expected highs or gurobi")),
        }
    }
}

/// A linear expression without constant term
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    terms: Vec<(Var, f64)>,
}

impl Expr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, coeff: f64, var: Var) -> &mut Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    /// The terms with duplicate variables merged and zero coefficients dropped, ordered by variable
    pub fn compressed(&self) -> Vec<(Var, f64)> {
        let mut merged = BTreeMap::new();
        for &(var, coeff) in &self.terms {
            *merged.entry(var).or_insert(0.0) += coeff;
        }
        merged.into_iter().filter(|&(_, c)| c != 0.0).collect()
    }

    /// Evaluates the expression for the given variable values
    pub fn eval(&self, value: impl Fn(Var) -> f64) -> f64 {
        self.terms.iter().map(|&(var, coeff)| coeff * value(var)).sum()
    }

    pub fn leq(self, rhs: f64) -> Constraint {
        Constraint::new(self, ConstrSense::Less, rhs)
    }

    pub fn geq(self, rhs: f64) -> Constraint {
        Constraint::new(self, ConstrSense::Greater, rhs)
    }
}

impl From<Var> for Expr {
    fn from(var: Var) -> Self {
        Expr {
            terms: vec![(var, 1.0)],
        }
    }
}

impl Mul<f64> for Var {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        Expr {
            terms: vec![(self, rhs)],
        }
    }
}

impl Mul<Var> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Var) -> Expr {
        rhs * self
    }
}

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;

    fn add(mut self, rhs: T) -> Expr {
        self.terms.extend(rhs.into().terms);
        self
    }
}

impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        self + (-rhs.into())
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(mut self) -> Expr {
        for (_, coeff) in &mut self.terms {
            *coeff = -*coeff;
        }
        self
    }
}

impl<T: Into<Expr>> Sum<T> for Expr {
    fn sum<I: Iterator<Item = T>>(iter: I) -> Self {
        iter.fold(Expr::new(), |acc, e| acc + e)
    }
}

/// `expr <sense> rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub expr: Expr,
    pub sense: ConstrSense,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(expr: Expr, sense: ConstrSense, rhs: f64) -> Self {
        Constraint { expr, sense, rhs }
    }

    /// Row bounds `(lower, upper)` of the constraint for a given right-hand side
    pub fn bounds(sense: ConstrSense, rhs: f64) -> (f64, f64) {
        match sense {
            ConstrSense::Less => (f64::NEG_INFINITY, rhs),
            ConstrSense::Greater => (rhs, f64::INFINITY),
            ConstrSense::Equal => (rhs, rhs),
        }
    }
}

/// A linear (or mixed integer) programming solver holding a single model.
pub trait LpSolver: Sized {
    /// Create an empty minimization model. Console output of the solver is disabled.
    fn new(name: &str) -> Result<Self>;

    fn name(&self) -> &str;

    /// Add a variable with objective coefficient `obj`
    fn add_var(&mut self, name: &str, vtype: VarType, obj: f64, bounds: &Range<f64>)
        -> Result<Var>;

    fn add_constr(&mut self, name: &str, constr: Constraint) -> Result<Constr>;

    /// Change the right-hand side of an existing constraint, keeping the rest of the model
    fn set_rhs(&mut self, constr: Constr, rhs: f64) -> Result<()>;

    fn set_sense(&mut self, sense: ModelSense) -> Result<()>;

    fn optimize(&mut self) -> Result<Status>;

    /// Objective value of the last optimal solve
    fn objective_value(&self) -> Result<f64>;

    /// Primal value of a variable in the last optimal solve
    fn value(&self, var: Var) -> Result<f64>;

    /// Dual price of a constraint in the last optimal solve, `d objective / d rhs`
    fn dual(&self, constr: Constr) -> Result<f64>;

    fn num_vars(&self) -> usize;

    fn num_constrs(&self) -> usize;

    /// A continuous non-negative variable
    fn cont(&mut self, name: &str, obj: f64) -> Result<Var> {
        self.add_var(name, VarType::Continuous, obj, &(0.0..f64::INFINITY))
    }

    /// Optimize, turning any outcome but an optimal solution into an error
    fn solve_to_optimality(&mut self) -> Result<()> {
        let model = self.name().to_string();
        match self.optimize()? {
            Status::Optimal => Ok(()),
            Status::Infeasible => Err(Error::Infeasible { model }),
            Status::Unbounded => Err(Error::Unbounded { model }),
            status => Err(Error::NotOptimal {
                model,
                status: format!("{:?}", status),
            }),
        }
    }
}

/// Checks that a handle index is within `len`, used by the backends
pub(crate) fn check_index<T: Into<usize>>(
    model: &str,
    handle: T,
    len: usize,
    err: impl FnOnce(String, usize) -> Error,
) -> Result<usize> {
    let index = handle.into();
    if index < len {
        Ok(index)
    } else {
        Err(err(model.to_string(), index))
    }
}

/// Names variables and constraints as `base_key`
pub fn var_name(base: &str, key: impl std::fmt::Display) -> String {
    format!("{}_{}", base, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_compose() {
        let x = Var::from(0);
        let y = Var::from(1);
        let e: Expr = 2.0 * x + y * 3.0 - Expr::from(x);
        assert_eq!(e.compressed(), vec![(x, 1.0), (y, 3.0)]);
        assert_eq!(e.eval(|v| if v == x { 2.0 } else { 1.0 }), 5.0);

        let sum: Expr = vec![x, y, x].into_iter().sum();
        assert_eq!(sum.compressed(), vec![(x, 2.0), (y, 1.0)]);

        let cancelled = Expr::from(y) - y;
        assert!(cancelled.compressed().is_empty());
    }

    #[test]
    fn constraint_bounds_follow_sense() {
        assert_eq!(
            Constraint::bounds(ConstrSense::Less, 3.0),
            (f64::NEG_INFINITY, 3.0)
        );
        assert_eq!(
            Constraint::bounds(ConstrSense::Greater, 3.0),
            (3.0, f64::INFINITY)
        );
        assert_eq!(Constraint::bounds(ConstrSense::Equal, 3.0), (3.0, 3.0));
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("highs".parse::<Backend>(), Ok(Backend::Highs));
        assert_eq!("gurobi".parse::<Backend>(), Ok(Backend::Gurobi));
        assert!("cplex".parse::<Backend>().is_err());
        assert_eq!(Backend::Highs.to_string(), "highs");
    }
}
