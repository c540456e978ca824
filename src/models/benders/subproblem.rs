use log::{debug, trace};
use typed_index_collections::{TiSlice, TiVec};

use crate::config::ArcCapacityForm;
use crate::error::{Error, Result};
use crate::models::utils::{AddVars, ConvertDuals, ConvertVars};
use crate::problem::{ArcIndex, CustomerIndex, FacilityIndex, HubIndex, Problem, ScenarioIndex};
use crate::solver::{var_name, Constr, Expr, LpSolver, Var};

use super::cut::Cut;

/// Relative tolerance of the strong duality check on the evaluated point
const DUALITY_TOLERANCE: f64 = 1e-5;

/// Dual prices of the recourse problem, each the change in recourse cost per unit increase
/// of the constraint's right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct Duals {
    /// Per arc, for the capacity `ship <= capacity + increase` regardless of the row orientation
    pub arc: TiVec<ArcIndex, f64>,
    pub facility: TiVec<FacilityIndex, f64>,
    pub hub: TiVec<HubIndex, f64>,
    pub demand: TiVec<CustomerIndex, f64>,
}

/// The recourse problem of one scenario solved at a fixed capacity increase
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub scenario: ScenarioIndex,
    /// Optimal cost of unmet demand
    pub cost: f64,
    pub duals: Duals,
    pub shipments: TiVec<ArcIndex, f64>,
    pub unmet: TiVec<CustomerIndex, f64>,
}

impl Evaluation {
    /// The optimality cut supporting the recourse cost at the evaluated point
    pub fn cut(&self, problem: &Problem) -> Cut {
        let arcs: f64 = self
            .duals
            .arc
            .iter_enumerated()
            .map(|(a, m)| m * problem.arc_capacity(a))
            .sum();
        let facilities: f64 = self
            .duals
            .facility
            .iter_enumerated()
            .map(|(f, m)| m * problem.facility_capacity(f))
            .sum();
        let demand: f64 = self
            .duals
            .demand
            .iter_enumerated()
            .map(|(c, m)| m * problem.demand(self.scenario, c))
            .sum();

        Cut {
            scenario: self.scenario,
            constant: arcs + facilities + demand,
            coefficients: self.duals.arc.clone(),
        }
    }
}

/// The rows of the recourse problem
struct Rows {
    arc: TiVec<ArcIndex, Constr>,
    facility: TiVec<FacilityIndex, Constr>,
    hub: TiVec<HubIndex, Constr>,
    demand: TiVec<CustomerIndex, Constr>,
}

/// A single recourse LP that is re-solved for each (capacity increase, scenario) pair by
/// changing the right-hand sides of the arc capacity and demand rows.
pub struct Subproblem<'p, S: LpSolver> {
    problem: &'p Problem,
    form: ArcCapacityForm,
    model: S,
    ship: TiVec<ArcIndex, Var>,
    unmet: TiVec<CustomerIndex, Var>,
    rows: Rows,
}

impl<'p, S: LpSolver> Subproblem<'p, S> {
    /// Builds the recourse LP, initially with zero capacity increase and the first scenario
    pub fn new(problem: &'p Problem, form: ArcCapacityForm) -> Result<Self> {
        trace!("Building recourse problem with {} arc rows", form);
        let mut model = S::new("recourse")?;

        let ship = problem.arcs().cont(&mut model, "ship", |_| 0.0)?;
        let unmet = problem
            .customers()
            .cont(&mut model, "unmet", |c| problem.unmet_cost(c))?;

        let scenario = ScenarioIndex::from(0);
        let mut arc = TiVec::with_capacity(problem.arcs().len());
        for a in problem.arcs().keys() {
            let constr = match form {
                ArcCapacityForm::UpperBound => Expr::from(ship[a]).leq(problem.arc_capacity(a)),
                ArcCapacityForm::NegatedLowerBound => {
                    (-Expr::from(ship[a])).geq(-problem.arc_capacity(a))
                }
            };
            arc.push(model.add_constr(&var_name("arc_cap", a), constr)?);
        }

        let mut facility = TiVec::with_capacity(problem.facilities().len());
        for f in problem.facilities().keys() {
            let outgoing: Expr = problem.arcs_from_facility(f).map(|a| ship[a]).sum();
            let constr = outgoing.leq(problem.facility_capacity(f));
            facility.push(model.add_constr(&var_name("facility_cap", f), constr)?);
        }

        let mut hub = TiVec::with_capacity(problem.hubs().len());
        for h in problem.hubs().keys() {
            let inflow: Expr = problem.arcs_into_hub(h).map(|a| ship[a]).sum();
            let outflow: Expr = problem.arcs_from_hub(h).map(|a| ship[a]).sum();
            let constr = (inflow - outflow).geq(0.0);
            hub.push(model.add_constr(&var_name("hub_flow", h), constr)?);
        }

        let mut demand = TiVec::with_capacity(problem.customers().len());
        for c in problem.customers().keys() {
            let inflow: Expr = problem.arcs_into_customer(c).map(|a| ship[a]).sum();
            let constr = (inflow + unmet[c]).geq(problem.demand(scenario, c));
            demand.push(model.add_constr(&var_name("demand", c), constr)?);
        }

        Ok(Subproblem {
            problem,
            form,
            model,
            ship,
            unmet,
            rows: Rows {
                arc,
                facility,
                hub,
                demand,
            },
        })
    }

    /// Solves the recourse problem of `scenario` with arc capacities raised by
    /// `capacity_increase`, returning its optimal cost and dual prices.
    ///
    /// Fails with [`Error::DualMismatch`] if the dual prices do not reproduce the optimal cost,
    /// which would make the resulting cut invalid.
    pub fn evaluate(
        &mut self,
        capacity_increase: &TiSlice<ArcIndex, f64>,
        scenario: ScenarioIndex,
    ) -> Result<Evaluation> {
        let problem = self.problem;

        for (a, row) in self.rows.arc.iter_enumerated() {
            let capacity = problem.arc_capacity(a) + capacity_increase[a];
            let rhs = match self.form {
                ArcCapacityForm::UpperBound => capacity,
                ArcCapacityForm::NegatedLowerBound => -capacity,
            };
            self.model.set_rhs(*row, rhs)?;
        }
        for (c, row) in self.rows.demand.iter_enumerated() {
            self.model.set_rhs(*row, problem.demand(scenario, c))?;
        }

        self.model.solve_to_optimality()?;
        let cost = self.model.objective_value()?;

        let raw = self.rows.arc.duals(&self.model)?;
        let arc = match self.form {
            ArcCapacityForm::UpperBound => raw,
            ArcCapacityForm::NegatedLowerBound => raw.into_iter().map(|d| -d).collect(),
        };
        let duals = Duals {
            arc,
            facility: self.rows.facility.duals(&self.model)?,
            hub: self.rows.hub.duals(&self.model)?,
            demand: self.rows.demand.duals(&self.model)?,
        };

        let evaluation = Evaluation {
            scenario,
            cost,
            duals,
            shipments: self.ship.convert(&self.model)?,
            unmet: self.unmet.convert(&self.model)?,
        };

        let height = evaluation.cut(problem).height(capacity_increase);
        if (height - cost).abs() > DUALITY_TOLERANCE * (1.0 + cost.abs()) {
            return Err(Error::DualMismatch {
                scenario,
                cost,
                height,
            });
        }

        debug!(
            "Scenario {} has recourse cost {}",
            problem.scenarios()[scenario],
            cost
        );
        Ok(evaluation)
    }

    /// The expected recourse cost of a capacity increase over all scenarios
    pub fn expected_cost(&mut self, capacity_increase: &TiSlice<ArcIndex, f64>) -> Result<f64> {
        let mut expected = 0.0;
        for s in self.problem.scenarios().keys() {
            let evaluation = self.evaluate(capacity_increase, s)?;
            expected += self.problem.probability(s) * evaluation.cost;
        }
        Ok(expected)
    }
}
