//! [`LpSolver`] backed by Gurobi through the `grb` crate.

use std::ops::Range;

use grb::prelude::*;
use log::trace;

use super::{
    check_index, Constr, ConstrSense, Constraint, LpSolver, ModelSense, Status, Var, VarType,
};
use crate::error::{Error, Result};

pub struct GurobiSolver {
    name: String,
    model: Model,
    vars: Vec<grb::Var>,
    constrs: Vec<grb::Constr>,
    solved: bool,
}

impl GurobiSolver {
    fn var(&self, var: Var) -> Result<&grb::Var> {
        let i = check_index(&self.name, var, self.vars.len(), |model, index| {
            Error::UnknownVariable { model, index }
        })?;
        Ok(&self.vars[i])
    }

    fn constr(&self, constr: Constr) -> Result<&grb::Constr> {
        let i = check_index(&self.name, constr, self.constrs.len(), |model, index| {
            Error::UnknownConstraint { model, index }
        })?;
        Ok(&self.constrs[i])
    }

    fn ensure_solved(&self) -> Result<()> {
        match self.solved {
            true => Ok(()),
            false => Err(Error::NoSolution {
                model: self.name.clone(),
            }),
        }
    }
}

impl LpSolver for GurobiSolver {
    fn new(name: &str) -> Result<Self> {
        let mut model = Model::new(name)?;
        model.set_param(param::OutputFlag, 0)?;
        Ok(GurobiSolver {
            name: name.to_string(),
            model,
            vars: Vec::new(),
            constrs: Vec::new(),
            solved: false,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn add_var(
        &mut self,
        name: &str,
        vtype: VarType,
        obj: f64,
        bounds: &Range<f64>,
    ) -> Result<Var> {
        let vtype = match vtype {
            VarType::Continuous => grb::VarType::Continuous,
            VarType::Integer => grb::VarType::Integer,
        };
        let var = self
            .model
            .add_var(name, vtype, obj, bounds.start, bounds.end, std::iter::empty())?;
        self.vars.push(var);
        self.solved = false;
        Ok(Var::from(self.vars.len() - 1))
    }

    fn add_constr(&mut self, name: &str, constr: Constraint) -> Result<Constr> {
        let mut terms = Vec::new();
        for (var, coeff) in constr.expr.compressed() {
            terms.push(coeff * *self.var(var)?);
        }
        let lhs = terms.into_iter().grb_sum();
        let rhs = constr.rhs;

        let c = match constr.sense {
            ConstrSense::Less => self.model.add_constr(name, c!(lhs <= rhs))?,
            ConstrSense::Greater => self.model.add_constr(name, c!(lhs >= rhs))?,
            ConstrSense::Equal => self.model.add_constr(name, c!(lhs == rhs))?,
        };
        self.constrs.push(c);
        self.solved = false;
        Ok(Constr::from(self.constrs.len() - 1))
    }

    fn set_rhs(&mut self, constr: Constr, rhs: f64) -> Result<()> {
        let c = *self.constr(constr)?;
        self.model.set_obj_attr(attr::RHS, &c, rhs)?;
        self.solved = false;
        Ok(())
    }

    fn set_sense(&mut self, sense: ModelSense) -> Result<()> {
        let sense = match sense {
            ModelSense::Minimize => grb::ModelSense::Minimize,
            ModelSense::Maximize => grb::ModelSense::Maximize,
        };
        self.model.set_attr(attr::ModelSense, sense)?;
        self.solved = false;
        Ok(())
    }

    fn optimize(&mut self) -> Result<Status> {
        trace!(
            "Optimizing `{}` with Gurobi: {} vars, {} constrs",
            self.name,
            self.vars.len(),
            self.constrs.len()
        );
        self.model.optimize()?;
        let status = match self.model.status()? {
            grb::Status::Optimal => Status::Optimal,
            grb::Status::Infeasible => Status::Infeasible,
            grb::Status::Unbounded => Status::Unbounded,
            grb::Status::InfOrUnbd => Status::InfeasibleOrUnbounded,
            other => Status::Other(format!("{:?}", other)),
        };
        self.solved = status == Status::Optimal;
        Ok(status)
    }

    fn objective_value(&self) -> Result<f64> {
        self.ensure_solved()?;
        Ok(self.model.get_attr(attr::ObjVal)?)
    }

    fn value(&self, var: Var) -> Result<f64> {
        self.ensure_solved()?;
        Ok(self.model.get_obj_attr(attr::X, self.var(var)?)?)
    }

    fn dual(&self, constr: Constr) -> Result<f64> {
        self.ensure_solved()?;
        Ok(self.model.get_obj_attr(attr::Pi, self.constr(constr)?)?)
    }

    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn num_constrs(&self) -> usize {
        self.constrs.len()
    }
}
