//! Running the configured method and judging first stage plans.

use log::info;
use typed_index_collections::{TiSlice, TiVec};

use crate::config::{Config, DemandModel, Method};
use crate::error::{Error, Result};
use crate::models::benders::{self, Evaluation, IterationLog, Subproblem};
use crate::models::extensive::ExtensiveForm;
use crate::problem::{ArcIndex, Problem, ScenarioIndex};
use crate::solver::{Backend, HighsSolver, LpSolver};

#[cfg(feature = "gurobi")]
use crate::solver::GurobiSolver;

/// Calls the generic function `$f` with the solver type selected by `$backend`
macro_rules! with_backend {
    ($backend:expr, $f:ident ( $($arg:expr),* $(,)? )) => {
        match $backend {
            Backend::Highs => $f::<HighsSolver>($($arg),*),
            #[cfg(feature = "gurobi")]
            Backend::Gurobi => $f::<GurobiSolver>($($arg),*),
            #[cfg(not(feature = "gurobi"))]
            Backend::Gurobi => Err(Error::UnavailableBackend(Backend::Gurobi.to_string())),
        }
    };
}

/// A first stage decision together with the objective the method reported for it
#[derive(Debug, Clone)]
pub struct Plan {
    pub capacity_increase: TiVec<ArcIndex, f64>,
    pub objective: f64,
    /// Progress of the decomposition, empty for the extensive form
    pub iterations: Vec<IterationLog>,
}

/// The cost of a first stage plan under every scenario
#[derive(Debug, Clone)]
pub struct PlanEvaluation {
    pub first_stage_cost: f64,
    pub expected_recourse: f64,
    /// `first_stage_cost + expected_recourse`
    pub total: f64,
    pub scenarios: TiVec<ScenarioIndex, Evaluation>,
}

/// The outcome of comparing the stochastic and the mean-value solutions
#[derive(Debug, Clone)]
pub struct StochasticAnalysis {
    /// Optimal objective of the stochastic problem (RP)
    pub recourse_problem: f64,
    /// Optimal objective of the mean-value problem
    pub mean_value: f64,
    /// Expected cost of the mean-value plan under the scenarios (EEV)
    pub expected_mean_value: f64,
    /// `EEV - RP`
    pub value_of_stochastic_solution: f64,
    pub mean_value_plan: TiVec<ArcIndex, f64>,
}

fn solve_with<L: LpSolver>(problem: &Problem, config: &Config) -> Result<Plan> {
    let mean;
    let problem = match config.demand {
        DemandModel::Stochastic => problem,
        DemandModel::MeanValue => {
            mean = problem.mean_value();
            &mean
        }
    };

    match config.method {
        Method::Benders => {
            let solution = benders::solve::<L>(problem, config)?;
            Ok(Plan {
                capacity_increase: solution.capacity_increase,
                objective: solution.objective,
                iterations: solution.iterations,
            })
        }
        Method::Extensive => {
            let solution = ExtensiveForm::solve::<L>(problem, config)?;
            Ok(Plan {
                capacity_increase: solution.capacity_increase,
                objective: solution.objective,
                iterations: Vec::new(),
            })
        }
    }
}

fn evaluate_with<L: LpSolver>(
    problem: &Problem,
    config: &Config,
    capacity_increase: &TiSlice<ArcIndex, f64>,
) -> Result<PlanEvaluation> {
    let mut subproblem = Subproblem::<L>::new(problem, config.arc_form)?;

    let mut scenarios = TiVec::with_capacity(problem.scenarios().len());
    for s in problem.scenarios().keys() {
        scenarios.push(subproblem.evaluate(capacity_increase, s)?);
    }

    let first_stage_cost = problem.expansion_cost_of(capacity_increase);
    let expected_recourse = scenarios
        .iter_enumerated()
        .map(|(s, e): (ScenarioIndex, &Evaluation)| problem.probability(s) * e.cost)
        .sum::<f64>();

    Ok(PlanEvaluation {
        first_stage_cost,
        expected_recourse,
        total: first_stage_cost + expected_recourse,
        scenarios,
    })
}

/// Solves the problem with the configured method, demand model and backend
pub fn solve(problem: &Problem, config: &Config) -> Result<Plan> {
    info!(
        "Solving with method {}, {} first stage, {} demand on {}",
        config.method, config.first_stage, config.demand, config.backend
    );
    with_backend!(config.backend, solve_with(problem, config))
}

/// The cost of a fixed capacity increase when demand follows the scenarios of `problem`
pub fn evaluate_plan(
    problem: &Problem,
    config: &Config,
    capacity_increase: &TiSlice<ArcIndex, f64>,
) -> Result<PlanEvaluation> {
    with_backend!(
        config.backend,
        evaluate_with(problem, config, capacity_increase)
    )
}

/// Compares the stochastic solution with the solution of the mean-value problem
pub fn value_of_stochastic_solution(
    problem: &Problem,
    config: &Config,
) -> Result<StochasticAnalysis> {
    let stochastic = Config {
        demand: DemandModel::Stochastic,
        ..config.clone()
    };
    let deterministic = Config {
        demand: DemandModel::MeanValue,
        ..config.clone()
    };

    let rp = solve(problem, &stochastic)?;
    let mv = solve(problem, &deterministic)?;
    let eev = evaluate_plan(problem, &stochastic, &mv.capacity_increase)?;

    let analysis = StochasticAnalysis {
        recourse_problem: rp.objective,
        mean_value: mv.objective,
        expected_mean_value: eev.total,
        value_of_stochastic_solution: eev.total - rp.objective,
        mean_value_plan: mv.capacity_increase,
    };
    info!(
        "RP = {:.6}, EEV = {:.6}, VSS = {:.6}",
        analysis.recourse_problem,
        analysis.expected_mean_value,
        analysis.value_of_stochastic_solution
    );
    Ok(analysis)
}
