use std::collections::HashMap;

use derive_more::Constructor;
use itertools::iproduct;
use log::{info, trace};
use typed_index_collections::TiVec;

use crate::config::{ArcCapacityForm, Config, FirstStage};
use crate::error::Result;
use crate::models::utils::{AddVars, ConvertVars};
use crate::problem::{ArcIndex, CustomerIndex, Problem, ScenarioIndex};
use crate::solver::{Expr, LpSolver, Var, VarType};

#[derive(Constructor)]
pub struct Variables {
    pub capinc: TiVec<ArcIndex, Var>,
    pub ship: HashMap<(ArcIndex, ScenarioIndex), Var>,
    pub unmet: HashMap<(CustomerIndex, ScenarioIndex), Var>,
}

/// The deterministic equivalent holding the recourse variables of every scenario
pub struct ExtensiveForm {}

#[allow(non_snake_case)]
impl ExtensiveForm {
    /// Builds the extensive form of the problem
    pub fn build<L: LpSolver>(problem: &Problem, config: &Config) -> Result<(L, Variables)> {
        trace!("Building extensive form");

        let mut model = L::new("extensive")?;

        let A = problem.arcs();
        let C = problem.customers();
        let S = problem.scenarios();

        //*************CREATE VARIABLES*************//

        let vtype = match config.first_stage {
            FirstStage::Continuous => VarType::Continuous,
            FirstStage::Integer => VarType::Integer,
        };
        let capinc = A.vars(&mut model, "capinc", vtype, &(0.0..f64::INFINITY), |a| {
            problem.expansion_cost(a)
        })?;
        let ship = (A, S).cont(&mut model, "ship", |_| 0.0)?;
        let unmet = (C, S).cont(&mut model, "unmet", |(c, s)| {
            problem.probability(s) * problem.unmet_cost(c)
        })?;

        //*************ADD CONSTRAINTS*************//

        // shipments are bounded by current plus added capacity
        for (a, s) in iproduct!(A.keys(), S.keys()) {
            let lhs = Expr::from(ship[&(a, s)]) - capinc[a];
            let capacity = problem.arc_capacity(a);
            let constr = match config.arc_form {
                ArcCapacityForm::UpperBound => lhs.leq(capacity),
                ArcCapacityForm::NegatedLowerBound => (-lhs).geq(-capacity),
            };
            model.add_constr(&format!("arc_cap_{a}_{s}"), constr)?;
        }

        // facility throughput
        for (f, s) in iproduct!(problem.facilities().keys(), S.keys()) {
            let lhs: Expr = problem.arcs_from_facility(f).map(|a| ship[&(a, s)]).sum();
            model.add_constr(
                &format!("facility_cap_{f}_{s}"),
                lhs.leq(problem.facility_capacity(f)),
            )?;
        }

        // hubs ship no more than they receive
        for (h, s) in iproduct!(problem.hubs().keys(), S.keys()) {
            let inflow: Expr = problem.arcs_into_hub(h).map(|a| ship[&(a, s)]).sum();
            let outflow: Expr = problem.arcs_from_hub(h).map(|a| ship[&(a, s)]).sum();
            model.add_constr(&format!("hub_flow_{h}_{s}"), (inflow - outflow).geq(0.0))?;
        }

        // demand is delivered or paid for
        for (c, s) in iproduct!(C.keys(), S.keys()) {
            let inflow: Expr = problem.arcs_into_customer(c).map(|a| ship[&(a, s)]).sum();
            model.add_constr(
                &format!("demand_{c}_{s}"),
                (inflow + unmet[&(c, s)]).geq(problem.demand(s, c)),
            )?;
        }

        trace!(
            "Extensive form has {} variables and {} constraints",
            model.num_vars(),
            model.num_constrs()
        );

        Ok((model, Variables::new(capinc, ship, unmet)))
    }

    pub fn solve<L: LpSolver>(problem: &Problem, config: &Config) -> Result<ExtensiveSolution> {
        info!(
            "Solving the extensive form over {} scenarios",
            problem.scenarios().len()
        );
        let (mut model, vars) = ExtensiveForm::build::<L>(problem, config)?;

        model.solve_to_optimality()?;

        ExtensiveSolution::new(&vars, &model)
    }
}

#[derive(Debug, Clone)]
pub struct ExtensiveSolution {
    pub capacity_increase: TiVec<ArcIndex, f64>,
    pub objective: f64,
    pub unmet: HashMap<(CustomerIndex, ScenarioIndex), f64>,
}

impl ExtensiveSolution {
    pub fn new<L: LpSolver>(variables: &Variables, model: &L) -> Result<ExtensiveSolution> {
        Ok(ExtensiveSolution {
            capacity_increase: variables.capinc.convert(model)?,
            objective: model.objective_value()?,
            unmet: variables.unmet.convert(model)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::read_problem;
    use crate::solver::HighsSolver;

    const SHORTAGE: &str = r#"{
        "facilities": ["F0"],
        "hubs": ["H0"],
        "customers": ["C0"],
        "scenarios": ["S0"],
        "arc_expansion_cost": [
            {"from": "F0", "to": "H0", "value": 1.0},
            {"from": "H0", "to": "C0", "value": 1.0}
        ],
        "facility_capacity": {"F0": 5.0},
        "arc_capacity": [
            {"from": "F0", "to": "H0", "value": 5.0},
            {"from": "H0", "to": "C0", "value": 5.0}
        ],
        "unmet_cost": {"C0": 3.0},
        "demand": [{"customer": "C0", "scenario": "S0", "value": 7.0}]
    }"#;

    #[test]
    fn facility_capacity_forces_unmet_demand() {
        let problem = read_problem(SHORTAGE.as_bytes()).unwrap();
        let solution = ExtensiveForm::solve::<HighsSolver>(&problem, &Config::default()).unwrap();

        // the facility cannot ship more than 5, so expanding arcs is pointless
        assert!((solution.objective - 6.0).abs() < 1e-6);
        assert!(solution.capacity_increase.iter().all(|x| x.abs() < 1e-6));
        let unmet = solution.unmet[&(CustomerIndex::from(0), ScenarioIndex::from(0))];
        assert!((unmet - 2.0).abs() < 1e-6);
    }

    #[test]
    fn model_size() {
        let problem = read_problem(SHORTAGE.as_bytes()).unwrap();
        let (model, vars) =
            ExtensiveForm::build::<HighsSolver>(&problem, &Config::default()).unwrap();
        // 2 arcs expanded, 2 shipments, 1 unmet
        assert_eq!(model.num_vars(), 5);
        // 2 arc, 1 facility, 1 hub, 1 demand row
        assert_eq!(model.num_constrs(), 5);
        assert_eq!(vars.ship.len(), 2);
    }
}
