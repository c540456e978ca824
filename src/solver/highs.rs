//! [`LpSolver`] backed by the HiGHS solver through the `highs` crate.
//!
//! The model is loaded into a HiGHS instance on the first solve and kept there. Cuts are
//! appended to the loaded instance and right-hand side changes are applied to it in place,
//! so every later solve starts from the previous basis. The definition is also kept on the
//! Rust side, and the instance is rebuilt from it only when a column is added, the sense
//! changes or HiGHS fails.

use std::ops::Range;

use highs::{Col, HighsModelStatus, Model, RowProblem, Sense};
use log::trace;

use super::{
    check_index, Constr, ConstrSense, Constraint, LpSolver, ModelSense, Status, Var, VarType,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Column {
    obj: f64,
    lower: f64,
    upper: f64,
    integer: bool,
}

#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(Var, f64)>,
    sense: ConstrSense,
    rhs: f64,
}

#[derive(Debug, Clone)]
struct Solution {
    columns: Vec<f64>,
    dual_rows: Vec<f64>,
    objective: f64,
}

/// A loaded HiGHS model. Row `i` of the instance is constraint `i`.
struct Instance {
    model: Model,
    cols: Vec<Col>,
}

pub struct HighsSolver {
    name: String,
    sense: ModelSense,
    columns: Vec<Column>,
    rows: Vec<Row>,
    instance: Option<Instance>,
    solution: Option<Solution>,
    loads: usize,
}

impl HighsSolver {
    /// Number of times the model was loaded into a fresh HiGHS instance
    pub fn loads(&self) -> usize {
        self.loads
    }

    fn is_mip(&self) -> bool {
        self.columns.iter().any(|c| c.integer)
    }

    fn objective_of(&self, values: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(values)
            .map(|(c, x)| c.obj * x)
            .sum()
    }

    fn highs_error(&self, action: &str, status: impl std::fmt::Debug) -> Error {
        Error::Solver(format!(
            "HiGHS failed to {} `{}`: {:?}",
            action, self.name, status
        ))
    }

    /// Solution of a model without rows: every column sits at its cheapest bound
    fn unconstrained_solution(&self) -> Option<Vec<f64>> {
        let direction = match self.sense {
            ModelSense::Minimize => 1.0,
            ModelSense::Maximize => -1.0,
        };

        self.columns
            .iter()
            .map(|c| {
                let cost = direction * c.obj;
                let x = if cost > 0.0 {
                    c.lower
                } else if cost < 0.0 {
                    c.upper
                } else if c.lower.is_finite() {
                    c.lower
                } else if c.upper.is_finite() {
                    c.upper
                } else {
                    0.0
                };
                x.is_finite().then(|| x)
            })
            .collect()
    }

    /// Loads the stored definition into a new HiGHS instance
    fn load(&mut self) -> Result<Instance> {
        trace!(
            "Loading `{}` into HiGHS: {} columns, {} rows",
            self.name,
            self.columns.len(),
            self.rows.len()
        );

        let mut pb = RowProblem::new();
        let cols: Vec<Col> = self
            .columns
            .iter()
            .map(|c| {
                if c.integer {
                    pb.add_integer_column(c.obj, c.lower..=c.upper)
                } else {
                    pb.add_column(c.obj, c.lower..=c.upper)
                }
            })
            .collect();

        for row in &self.rows {
            let factors: Vec<(Col, f64)> = row
                .terms
                .iter()
                .map(|&(var, coeff)| (cols[usize::from(var)], coeff))
                .collect();
            let (lower, upper) = Constraint::bounds(row.sense, row.rhs);
            pb.add_row(lower..=upper, factors);
        }

        let sense = match self.sense {
            ModelSense::Minimize => Sense::Minimise,
            ModelSense::Maximize => Sense::Maximise,
        };
        let mut model = pb
            .try_optimise(sense)
            .map_err(|status| self.highs_error("load", status))?;
        model.set_option("output_flag", false);
        if self.is_mip() {
            model.set_option("mip_rel_gap", 1e-9);
        }

        self.loads += 1;
        Ok(Instance { model, cols })
    }
}

/// Changes the bounds of row `row` of a loaded model in place
fn change_row_bounds(model: &mut Model, row: usize, lower: f64, upper: f64) -> Option<()> {
    let row = row.try_into().ok()?;
    // SAFETY: the pointer comes from a live model and `row` is below its row count
    let status =
        unsafe { highs_sys::Highs_changeRowBounds(model.as_mut_ptr(), row, lower, upper) };
    // negative statuses are errors, warnings are positive
    (status >= 0).then(|| ())
}

impl LpSolver for HighsSolver {
    fn new(name: &str) -> Result<Self> {
        Ok(HighsSolver {
            name: name.to_string(),
            sense: ModelSense::Minimize,
            columns: Vec::new(),
            rows: Vec::new(),
            instance: None,
            solution: None,
            loads: 0,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn add_var(
        &mut self,
        _name: &str,
        vtype: VarType,
        obj: f64,
        bounds: &Range<f64>,
    ) -> Result<Var> {
        self.columns.push(Column {
            obj,
            lower: bounds.start,
            upper: bounds.end,
            integer: vtype == VarType::Integer,
        });
        self.instance = None;
        self.solution = None;
        Ok(Var::from(self.columns.len() - 1))
    }

    fn add_constr(&mut self, _name: &str, constr: Constraint) -> Result<Constr> {
        let terms = constr.expr.compressed();
        for &(var, _) in &terms {
            check_index(&self.name, var, self.columns.len(), |model, index| {
                Error::UnknownVariable { model, index }
            })?;
        }

        if let Some(instance) = &mut self.instance {
            let factors: Vec<(Col, f64)> = terms
                .iter()
                .map(|&(var, coeff)| (instance.cols[usize::from(var)], coeff))
                .collect();
            let (lower, upper) = Constraint::bounds(constr.sense, constr.rhs);
            if let Err(status) = instance.model.try_add_row(lower..=upper, factors) {
                self.instance = None;
                return Err(self.highs_error("add a row to", status));
            }
        }

        self.rows.push(Row {
            terms,
            sense: constr.sense,
            rhs: constr.rhs,
        });
        self.solution = None;
        Ok(Constr::from(self.rows.len() - 1))
    }

    fn set_rhs(&mut self, constr: Constr, rhs: f64) -> Result<()> {
        let i = check_index(&self.name, constr, self.rows.len(), |model, index| {
            Error::UnknownConstraint { model, index }
        })?;
        self.rows[i].rhs = rhs;
        self.solution = None;

        if let Some(instance) = &mut self.instance {
            let (lower, upper) = Constraint::bounds(self.rows[i].sense, rhs);
            if change_row_bounds(&mut instance.model, i, lower, upper).is_none() {
                self.instance = None;
                return Err(self.highs_error("change the bounds of a row in", i));
            }
        }
        Ok(())
    }

    fn set_sense(&mut self, sense: ModelSense) -> Result<()> {
        if sense != self.sense {
            self.sense = sense;
            self.instance = None;
        }
        self.solution = None;
        Ok(())
    }

    fn optimize(&mut self) -> Result<Status> {
        self.solution = None;
        let Instance { model, cols } = match self.instance.take() {
            Some(instance) => instance,
            None => self.load()?,
        };

        let solved = model
            .try_solve()
            .map_err(|status| self.highs_error("solve", status))?;

        let status = match solved.status() {
            HighsModelStatus::Optimal => {
                let solution = solved.get_solution();
                let columns = solution.columns().to_vec();
                if columns.len() != self.columns.len() {
                    return Err(Error::Solver(format!(
                        "HiGHS returned {} column values for {} columns in `{}`",
                        columns.len(),
                        self.columns.len(),
                        self.name
                    )));
                }
                let objective = self.objective_of(&columns);
                self.solution = Some(Solution {
                    columns,
                    dual_rows: solution.dual_rows().to_vec(),
                    objective,
                });
                Status::Optimal
            }
            HighsModelStatus::ModelEmpty => match self.unconstrained_solution() {
                Some(columns) => {
                    let objective = self.objective_of(&columns);
                    self.solution = Some(Solution {
                        columns,
                        dual_rows: Vec::new(),
                        objective,
                    });
                    Status::Optimal
                }
                None => Status::Unbounded,
            },
            HighsModelStatus::Infeasible => Status::Infeasible,
            HighsModelStatus::Unbounded => Status::Unbounded,
            HighsModelStatus::UnboundedOrInfeasible => Status::InfeasibleOrUnbounded,
            other => Status::Other(format!("{:?}", other)),
        };

        self.instance = Some(Instance {
            model: Model::from(solved),
            cols,
        });
        Ok(status)
    }

    fn objective_value(&self) -> Result<f64> {
        self.solution
            .as_ref()
            .map(|s| s.objective)
            .ok_or_else(|| Error::NoSolution {
                model: self.name.clone(),
            })
    }

    fn value(&self, var: Var) -> Result<f64> {
        let solution = self.solution.as_ref().ok_or_else(|| Error::NoSolution {
            model: self.name.clone(),
        })?;
        let i = check_index(&self.name, var, solution.columns.len(), |model, index| {
            Error::UnknownVariable { model, index }
        })?;
        Ok(solution.columns[i])
    }

    fn dual(&self, constr: Constr) -> Result<f64> {
        let solution = self.solution.as_ref().ok_or_else(|| Error::NoSolution {
            model: self.name.clone(),
        })?;
        let i = check_index(&self.name, constr, self.rows.len(), |model, index| {
            Error::UnknownConstraint { model, index }
        })?;
        solution
            .dual_rows
            .get(i)
            .copied()
            .ok_or_else(|| Error::Solver(format!("no dual values available for `{}`", self.name)))
    }

    fn num_vars(&self) -> usize {
        self.columns.len()
    }

    fn num_constrs(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Expr;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn duals_are_objective_sensitivities() {
        // min x + 2y  s.t.  x + y >= 3,  y <= 5,  x <= 1
        let mut model = HighsSolver::new("sensitivity").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        let y = model.cont("y", 2.0).unwrap();
        let cover = model.add_constr("cover", (Expr::from(x) + y).geq(3.0)).unwrap();
        let cap_y = model.add_constr("cap_y", Expr::from(y).leq(5.0)).unwrap();
        let cap_x = model.add_constr("cap_x", Expr::from(x).leq(1.0)).unwrap();

        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 5.0));
        assert!(close(model.value(x).unwrap(), 1.0));
        assert!(close(model.value(y).unwrap(), 2.0));

        // raising the cover requirement costs 2 per unit, raising x's cap saves 1 per unit
        assert!(close(model.dual(cover).unwrap(), 2.0));
        assert!(close(model.dual(cap_x).unwrap(), -1.0));
        assert!(close(model.dual(cap_y).unwrap(), 0.0));
    }

    #[test]
    fn rhs_changes_are_picked_up() {
        let mut model = HighsSolver::new("rhs").unwrap();
        let x = model.cont("x", 3.0).unwrap();
        let floor = model.add_constr("floor", Expr::from(x).geq(1.0)).unwrap();

        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 3.0));

        model.set_rhs(floor, 4.0).unwrap();
        assert!(matches!(model.value(x), Err(Error::NoSolution { .. })));
        model.solve_to_optimality().unwrap();
        assert!(close(model.value(x).unwrap(), 4.0));
        assert!(close(model.objective_value().unwrap(), 12.0));
    }

    #[test]
    fn loaded_instance_is_reused() {
        // min x + y  s.t.  x + y >= 2,  x >= 0.5
        let mut model = HighsSolver::new("reuse").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        let y = model.cont("y", 1.0).unwrap();
        let cover = model.add_constr("cover", (Expr::from(x) + y).geq(2.0)).unwrap();
        model.add_constr("floor", Expr::from(x).geq(0.5)).unwrap();
        assert_eq!(model.loads(), 0);

        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 2.0));

        model.set_rhs(cover, 5.0).unwrap();
        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 5.0));
        assert!(close(model.dual(cover).unwrap(), 1.0));

        // rows added after loading go into the same instance
        let cap = model.add_constr("cap", (Expr::from(x) + y).leq(4.0)).unwrap();
        assert!(model.solve_to_optimality().is_err());
        model.set_rhs(cover, 3.0).unwrap();
        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 3.0));
        assert!(close(model.dual(cap).unwrap(), 0.0));
        assert_eq!(model.loads(), 1);

        // a new column needs a fresh instance
        let z = model.cont("z", 0.5).unwrap();
        model.add_constr("z_floor", Expr::from(z).geq(2.0)).unwrap();
        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 4.0));
        assert_eq!(model.loads(), 2);
    }

    #[test]
    fn model_without_rows_is_solved_at_bounds() {
        let mut model = HighsSolver::new("empty").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        let y = model
            .add_var("y", VarType::Continuous, 0.5, &(2.0..f64::INFINITY))
            .unwrap();

        model.solve_to_optimality().unwrap();
        assert!(close(model.value(x).unwrap(), 0.0));
        assert!(close(model.value(y).unwrap(), 2.0));
        assert!(close(model.objective_value().unwrap(), 1.0));
    }

    #[test]
    fn maximization() {
        // max x + 2y  s.t.  x + y <= 4,  y <= 3
        let mut model = HighsSolver::new("max").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        let y = model.cont("y", 2.0).unwrap();
        model.add_constr("budget", (Expr::from(x) + y).leq(4.0)).unwrap();
        model.add_constr("cap_y", Expr::from(y).leq(3.0)).unwrap();

        model.set_sense(ModelSense::Maximize).unwrap();
        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 7.0));
        assert!(close(model.value(x).unwrap(), 1.0));
        assert!(close(model.value(y).unwrap(), 3.0));

        model.set_sense(ModelSense::Minimize).unwrap();
        model.solve_to_optimality().unwrap();
        assert!(close(model.objective_value().unwrap(), 0.0));

        // without rows the columns go to their most profitable bound
        let mut bounded = HighsSolver::new("max_empty").unwrap();
        let z = bounded
            .add_var("z", VarType::Continuous, 2.0, &(0.0..3.0))
            .unwrap();
        bounded.set_sense(ModelSense::Maximize).unwrap();
        bounded.solve_to_optimality().unwrap();
        assert!(close(bounded.value(z).unwrap(), 3.0));
        assert!(close(bounded.objective_value().unwrap(), 6.0));

        let mut unbounded = HighsSolver::new("max_unbounded").unwrap();
        unbounded.cont("w", 1.0).unwrap();
        unbounded.set_sense(ModelSense::Maximize).unwrap();
        assert!(matches!(
            unbounded.solve_to_optimality(),
            Err(Error::Unbounded { .. })
        ));
    }

    #[test]
    fn integer_columns_are_respected() {
        // min -x  s.t.  2x <= 3, x integer
        let mut model = HighsSolver::new("mip").unwrap();
        let x = model
            .add_var("x", VarType::Integer, -1.0, &(0.0..f64::INFINITY))
            .unwrap();
        model.add_constr("cap", (2.0 * x).leq(3.0)).unwrap();

        model.solve_to_optimality().unwrap();
        assert!(close(model.value(x).unwrap(), 1.0));
    }

    #[test]
    fn infeasible_model_is_reported() {
        let mut model = HighsSolver::new("broken").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        model.add_constr("low", Expr::from(x).leq(1.0)).unwrap();
        model.add_constr("high", Expr::from(x).geq(2.0)).unwrap();

        assert_eq!(model.optimize().unwrap(), Status::Infeasible);
        assert!(matches!(
            model.solve_to_optimality(),
            Err(Error::Infeasible { .. })
        ));
    }

    #[test]
    fn rejected_model_is_an_error() {
        let mut model = HighsSolver::new("rejected").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        model
            .add_constr("huge", (f64::INFINITY * x).leq(1.0))
            .unwrap();

        assert!(matches!(model.optimize(), Err(Error::Solver(_))));
        assert!(matches!(model.value(x), Err(Error::NoSolution { .. })));
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let mut model = HighsSolver::new("handles").unwrap();
        let x = model.cont("x", 1.0).unwrap();
        let stranger = Var::from(7);
        assert!(matches!(
            model.add_constr("bad", (Expr::from(x) + stranger).leq(1.0)),
            Err(Error::UnknownVariable { index: 7, .. })
        ));
        assert!(matches!(
            model.set_rhs(Constr::from(0), 1.0),
            Err(Error::UnknownConstraint { index: 0, .. })
        ));
    }
}
