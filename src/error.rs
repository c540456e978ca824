use derive_more::Display;

use crate::problem::{ProblemConstructionError, ScenarioIndex};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    /// The solver proved the model infeasible
    #[display(fmt = "model `{}` is infeasible", model)]
    Infeasible { model: String },
    /// The solver proved the model unbounded
    #[display(fmt = "model `{}` is unbounded", model)]
    Unbounded { model: String },
    /// The solver stopped without an optimal solution for some other reason
    #[display(fmt = "model `{}` was not solved to optimality: {}", model, status)]
    NotOptimal { model: String, status: String },
    /// An error reported by the underlying solver library
    #[display(fmt = "solver error: {}", _0)]
    Solver(String),
    /// Solution values were requested before a successful solve
    #[display(fmt = "model `{}` has no solution available", model)]
    NoSolution { model: String },
    /// A variable handle that does not belong to the model
    #[display(fmt = "unknown variable {} in model `{}`", index, model)]
    UnknownVariable { model: String, index: usize },
    /// A constraint handle that does not belong to the model
    #[display(fmt = "unknown constraint {} in model `{}`", index, model)]
    UnknownConstraint { model: String, index: usize },
    /// The input data is malformed
    #[display(fmt = "invalid problem data: {}", _0)]
    Construction(ProblemConstructionError),
    #[display(fmt = "i/o error: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "malformed json: {}", _0)]
    Json(serde_json::Error),
    /// The subproblem duals do not reproduce the subproblem objective at the evaluated point
    #[display(
        fmt = "dual prices of scenario {} give {} but the recourse cost is {}",
        scenario,
        height,
        cost
    )]
    DualMismatch {
        scenario: ScenarioIndex,
        cost: f64,
        height: f64,
    },
    /// The configured termination criterion fired before the decomposition converged
    #[display(fmt = "terminated after {} iterations without converging", iterations)]
    Terminated { iterations: u64 },
    /// The requested backend is not compiled into this binary
    #[display(fmt = "solver backend `{}` is not available", _0)]
    UnavailableBackend(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Construction(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProblemConstructionError> for Error {
    fn from(e: ProblemConstructionError) -> Self {
        Error::Construction(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

#[cfg(feature = "gurobi")]
impl From<grb::Error> for Error {
    fn from(e: grb::Error) -> Self {
        Error::Solver(e.to_string())
    }
}
