//! The L-shaped method for the two-stage capacity expansion problem.
//!
//! Each iteration solves the [`MasterProblem`], evaluates the recourse cost of every scenario
//! at the master's capacity increase with the [`Subproblem`], and adds an optimality cut for
//! each scenario whose cost is underestimated by more than `epsilon`. The method has converged
//! when an iteration adds no cuts.

pub mod cut;
pub mod master;
pub mod subproblem;

pub use cut::Cut;
pub use master::{MasterProblem, MasterSolution};
pub use subproblem::{Duals, Evaluation, Subproblem};

use log::{debug, info};
use typed_index_collections::TiVec;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::problem::{ArcIndex, Problem, ScenarioIndex};
use crate::solver::LpSolver;
use crate::termination::Termination;

/// The state of the decomposition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Solve the master and evaluate the scenarios
    Iterate,
    /// Decide whether to stop, given the number of cuts added in the last iteration
    CheckConvergence { cuts: usize },
    /// No scenario is underestimated at the current first stage solution
    Done,
}

/// Progress of a single iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationLog {
    pub iteration: u64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub cuts: usize,
}

#[derive(Debug, Clone)]
pub struct BendersSolution {
    pub capacity_increase: TiVec<ArcIndex, f64>,
    /// Expansion cost plus expected recourse cost of `capacity_increase`
    pub objective: f64,
    pub lower_bound: f64,
    /// The best upper bound found during the run
    pub upper_bound: f64,
    pub theta: TiVec<ScenarioIndex, f64>,
    pub iterations: Vec<IterationLog>,
}

pub struct BendersSolver<'p, S: LpSolver> {
    problem: &'p Problem,
    epsilon: f64,
    termination: Termination,
    master: MasterProblem<'p, S>,
    subproblem: Subproblem<'p, S>,
    state: LoopState,
    iterations: Vec<IterationLog>,
    /// The master solution and first stage cost plus expected recourse of the last iteration
    current: Option<(MasterSolution, f64)>,
    upper_bound: f64,
}

impl<'p, S: LpSolver> BendersSolver<'p, S> {
    pub fn new(problem: &'p Problem, config: &Config) -> Result<Self> {
        Ok(BendersSolver {
            problem,
            epsilon: config.epsilon,
            termination: Termination::from_config(config),
            master: MasterProblem::new(problem, config.first_stage)?,
            subproblem: Subproblem::new(problem, config.arc_form)?,
            state: LoopState::Iterate,
            iterations: Vec::new(),
            current: None,
            upper_bound: f64::INFINITY,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn iterations(&self) -> &[IterationLog] {
        &self.iterations
    }

    pub fn cuts(&self) -> &[Cut] {
        self.master.cuts()
    }

    /// Solve the master, evaluate every scenario at its solution and add the violated cuts.
    /// Returns the number of cuts added.
    fn iterate(&mut self) -> Result<usize> {
        let problem = self.problem;
        let iteration = self.iterations.len() as u64 + 1;
        let master = self.master.solve()?;
        let x = &master.capacity_increase;

        let mut expected = 0.0;
        let mut cuts = Vec::new();
        for s in problem.scenarios().keys() {
            let evaluation = self.subproblem.evaluate(x, s)?;
            expected += problem.probability(s) * evaluation.cost;

            if evaluation.cost > master.theta[s] + self.epsilon {
                debug!(
                    "Scenario {} is underestimated: cost {} > theta {}",
                    problem.scenarios()[s],
                    evaluation.cost,
                    master.theta[s]
                );
                cuts.push(evaluation.cut(problem));
            }
        }

        let upper_bound = problem.expansion_cost_of(x) + expected;
        self.upper_bound = self.upper_bound.min(upper_bound);

        let added = cuts.len();
        for cut in cuts {
            self.master.add_cut(cut)?;
        }

        info!(
            "Iteration {}: lower bound {:.6}, upper bound {:.6}, {} cuts",
            iteration, master.objective, upper_bound, added
        );
        self.iterations.push(IterationLog {
            iteration,
            lower_bound: master.objective,
            upper_bound,
            cuts: added,
        });
        self.current = Some((master, upper_bound));

        Ok(added)
    }

    /// Advances the loop by one transition
    pub fn step(&mut self) -> Result<LoopState> {
        self.state = match self.state {
            LoopState::Iterate => LoopState::CheckConvergence {
                cuts: self.iterate()?,
            },
            LoopState::CheckConvergence { cuts: 0 } => LoopState::Done,
            LoopState::CheckConvergence { .. } => {
                let iterations = self.iterations.len() as u64;
                if self.termination.should_terminate(iterations) {
                    info!("Stopping after {} iterations: {}", iterations, self.termination);
                    return Err(Error::Terminated { iterations });
                }
                LoopState::Iterate
            }
            LoopState::Done => LoopState::Done,
        };

        Ok(self.state)
    }

    /// Runs the loop until convergence
    pub fn run(mut self) -> Result<BendersSolution> {
        info!(
            "Solving {} scenarios with the L-shaped method",
            self.problem.scenarios().len()
        );
        while self.step()? != LoopState::Done {}

        let iterations = self.iterations;
        let upper_bound = self.upper_bound;
        let (master, objective) = self.current.ok_or_else(|| Error::NoSolution {
            model: String::from("master"),
        })?;

        info!(
            "Converged after {} iterations with objective {:.6}",
            iterations.len(),
            objective
        );
        Ok(BendersSolution {
            capacity_increase: master.capacity_increase,
            objective,
            lower_bound: master.objective,
            upper_bound,
            theta: master.theta,
            iterations,
        })
    }
}

/// Solves the problem with the L-shaped method using the solver `S`
pub fn solve<S: LpSolver>(problem: &Problem, config: &Config) -> Result<BendersSolution> {
    BendersSolver::<S>::new(problem, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::read_problem;
    use crate::solver::HighsSolver;

    const SINGLE: &str = r#"{
        "facilities": ["F0"],
        "hubs": ["H0"],
        "customers": ["C0"],
        "scenarios": ["S0", "S1"],
        "arc_expansion_cost": [
            {"from": "F0", "to": "H0", "value": 1.0},
            {"from": "H0", "to": "C0", "value": 1.0}
        ],
        "facility_capacity": {"F0": 10.0},
        "arc_capacity": [
            {"from": "F0", "to": "H0", "value": 4.0},
            {"from": "H0", "to": "C0", "value": 3.0}
        ],
        "unmet_cost": {"C0": 6.0},
        "demand": [
            {"customer": "C0", "scenario": "S0", "value": 2.0},
            {"customer": "C0", "scenario": "S1", "value": 8.0}
        ]
    }"#;

    #[test]
    fn loop_walks_through_its_states() {
        let problem = read_problem(SINGLE.as_bytes()).unwrap();
        let config = Config::default();
        let mut solver = BendersSolver::<HighsSolver>::new(&problem, &config).unwrap();

        assert_eq!(solver.state(), LoopState::Iterate);
        assert!(matches!(
            solver.step().unwrap(),
            LoopState::CheckConvergence { cuts: 1 }
        ));
        assert_eq!(solver.step().unwrap(), LoopState::Iterate);

        let mut steps = 0;
        while solver.step().unwrap() != LoopState::Done {
            steps += 1;
            assert!(steps < 100);
        }
        assert_eq!(solver.step().unwrap(), LoopState::Done);
        assert_eq!(solver.iterations().last().map(|log| log.cuts), Some(0));
        assert!(!solver.cuts().is_empty());
    }

    #[test]
    fn converges_to_the_hand_computed_optimum() {
        // Expanding the second arc costs 1 + 1 per unit (the first arc saturates at 4 units)
        // and saves 6 * 1/2 = 3 in expectation up to 8 units, so both arcs are expanded fully.
        let problem = read_problem(SINGLE.as_bytes()).unwrap();
        let solution = solve::<HighsSolver>(&problem, &Config::default()).unwrap();

        // x = (4, 5): cost 4 + 5 = 9, no unmet demand in either scenario
        assert!((solution.objective - 9.0).abs() < 1e-6);
        assert!((solution.capacity_increase[ArcIndex::from(0)] - 4.0).abs() < 1e-6);
        assert!((solution.capacity_increase[ArcIndex::from(1)] - 5.0).abs() < 1e-6);
        assert!((solution.upper_bound - solution.lower_bound).abs() < 1e-5);
    }

    #[test]
    fn iteration_limit_aborts() {
        let problem = read_problem(SINGLE.as_bytes()).unwrap();
        let config = Config {
            max_iterations: Some(1),
            ..Config::default()
        };
        assert!(matches!(
            solve::<HighsSolver>(&problem, &config),
            Err(Error::Terminated { iterations: 1 })
        ));
    }

    #[test]
    fn expired_timeout_aborts() {
        let problem = read_problem(SINGLE.as_bytes()).unwrap();
        let config = Config {
            timeout: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            solve::<HighsSolver>(&problem, &config),
            Err(Error::Terminated { iterations: 1 })
        ));
    }
}
