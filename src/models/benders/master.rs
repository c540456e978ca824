use log::{debug, trace};
use typed_index_collections::TiVec;

use crate::config::FirstStage;
use crate::error::Result;
use crate::models::utils::{AddVars, ConvertVars};
use crate::problem::{ArcIndex, Problem, ScenarioIndex};
use crate::solver::{var_name, Expr, LpSolver, Var, VarType};

use super::cut::Cut;

/// Optimal solution of the relaxed master problem
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSolution {
    pub capacity_increase: TiVec<ArcIndex, f64>,
    /// The current estimate of the recourse cost of each scenario
    pub theta: TiVec<ScenarioIndex, f64>,
    /// Expansion cost plus expected recourse estimate, a lower bound on the optimum
    pub objective: f64,
}

/// The first stage problem: capacity increase per arc and a recourse cost estimate per
/// scenario, bounded from below by the cuts added so far.
pub struct MasterProblem<'p, S: LpSolver> {
    problem: &'p Problem,
    model: S,
    capacity: TiVec<ArcIndex, Var>,
    theta: TiVec<ScenarioIndex, Var>,
    cuts: Vec<Cut>,
}

impl<'p, S: LpSolver> MasterProblem<'p, S> {
    pub fn new(problem: &'p Problem, first_stage: FirstStage) -> Result<Self> {
        trace!("Building master problem with {} first stage", first_stage);
        let mut model = S::new("master")?;

        let vtype = match first_stage {
            FirstStage::Continuous => VarType::Continuous,
            FirstStage::Integer => VarType::Integer,
        };
        let capacity = problem.arcs().vars(
            &mut model,
            "capinc",
            vtype,
            &(0.0..f64::INFINITY),
            |a| problem.expansion_cost(a),
        )?;
        // recourse costs are non-negative since all penalties are
        let theta = problem
            .scenarios()
            .cont(&mut model, "theta", |s| problem.probability(s))?;

        Ok(MasterProblem {
            problem,
            model,
            capacity,
            theta,
            cuts: Vec::new(),
        })
    }

    /// Adds `theta_s - sum_a c_a x_a >= constant` permanently
    pub fn add_cut(&mut self, cut: Cut) -> Result<()> {
        let lhs = cut
            .coefficients
            .iter_enumerated()
            .fold(Expr::from(self.theta[cut.scenario]), |lhs, (a, c)| {
                lhs - *c * self.capacity[a]
            });

        let name = var_name("cut", self.cuts.len());
        self.model.add_constr(&name, lhs.geq(cut.constant))?;
        debug!(
            "Added {} for scenario {}: constant {}",
            name,
            self.problem.scenarios()[cut.scenario],
            cut.constant
        );
        self.cuts.push(cut);
        Ok(())
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn solve(&mut self) -> Result<MasterSolution> {
        self.model.solve_to_optimality()?;

        Ok(MasterSolution {
            capacity_increase: self.capacity.convert(&self.model)?,
            theta: self.theta.convert(&self.model)?,
            objective: self.model.objective_value()?,
        })
    }
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
            {"from": "H0", "to": "C0", "value": 2.0}
        ],
        "facility_capacity": {"F0": 10.0},
        "arc_capacity": [
            {"from": "F0", "to": "H0", "value": 4.0},
            {"from": "H0", "to": "C0", "value": 3.0}
        ],
        "unmet_cost": {"C0": 4.0},
        "demand": [
            {"customer": "C0", "scenario": "S0", "value": 2.0},
            {"customer": "C0", "scenario": "S1", "value": 8.0}
        ]
    }"#;

    #[test]
    fn uncut_master_expands_nothing() {
        let problem = read_problem(SINGLE.as_bytes()).unwrap();
        let mut master =
            MasterProblem::<HighsSolver>::new(&problem, FirstStage::Continuous).unwrap();
        let solution = master.solve().unwrap();
        assert_eq!(solution.objective, 0.0);
        assert!(solution.capacity_increase.iter().all(|x| *x == 0.0));
        assert!(master.cuts().is_empty());
    }

    #[test]
    fn cuts_raise_the_bound() {
        let problem = read_problem(SINGLE.as_bytes()).unwrap();
        let mut master =
            MasterProblem::<HighsSolver>::new(&problem, FirstStage::Continuous).unwrap();

        // theta_1 >= 20 - 4 x_1, expanding the second arc is worth 4 per unit at cost 2
        master
            .add_cut(Cut {
                scenario: ScenarioIndex::from(1),
                constant: 20.0,
                coefficients: vec![0.0, -4.0].into(),
            })
            .unwrap();
        let solution = master.solve().unwrap();

        // probability 1/2 makes expansion worth 2 per unit, a tie with its cost
        assert!((solution.objective - 10.0).abs() < 1e-6);
        let x = solution.capacity_increase[ArcIndex::from(1)];
        assert!((solution.theta[ScenarioIndex::from(1)] - (20.0 - 4.0 * x)).abs() < 1e-6);
        assert_eq!(master.cuts().len(), 1);
    }
}
