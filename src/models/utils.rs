use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::ops::Range;

use typed_index_collections::{TiSlice, TiVec};

use crate::error::Result;
use crate::solver::{var_name, Constr, LpSolver, Var, VarType};

pub trait AddVars {
    /// The key identifying each created variable
    type Key: Copy;
    type Out;

    /// Create a variable for each key with a closure
    fn vars_with<F: FnMut(Self::Key) -> Result<Var>>(&self, func: F) -> Result<Self::Out>;

    /// The suffix used when naming the variable of `key`
    fn key_name(key: Self::Key) -> String;

    /// Create a variable of any type for each key, with objective coefficient `obj(key)`
    fn vars<S: LpSolver>(
        &self,
        model: &mut S,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
        mut obj: impl FnMut(Self::Key) -> f64,
    ) -> Result<Self::Out> {
        self.vars_with(|key| {
            model.add_var(
                &var_name(base_name, Self::key_name(key)),
                vtype,
                obj(key),
                bounds,
            )
        })
    }

    /// A continuous non-negative variable for each key
    fn cont<S: LpSolver>(
        &self,
        model: &mut S,
        base_name: &str,
        obj: impl FnMut(Self::Key) -> f64,
    ) -> Result<Self::Out> {
        self.vars(
            model,
            base_name,
            VarType::Continuous,
            &(0.0..f64::INFINITY),
            obj,
        )
    }
}

impl<K, V> AddVars for TiSlice<K, V>
where
    K: From<usize> + Copy + Display,
{
    type Key = K;
    type Out = TiVec<K, Var>;

    fn vars_with<F: FnMut(K) -> Result<Var>>(&self, mut func: F) -> Result<Self::Out> {
        let mut vec = TiVec::with_capacity(self.len());
        for key in self.keys() {
            vec.push(func(key)?);
        }

        Ok(vec)
    }

    fn key_name(key: K) -> String {
        key.to_string()
    }
}

/// Variables over the product of two index sets, keyed by pairs
impl<'a, A, B, U, V> AddVars for (&'a TiSlice<A, U>, &'a TiSlice<B, V>)
where
    A: From<usize> + Copy + Display + Eq + Hash,
    B: From<usize> + Copy + Display + Eq + Hash,
{
    type Key = (A, B);
    type Out = HashMap<(A, B), Var>;

    fn vars_with<F: FnMut((A, B)) -> Result<Var>>(&self, mut func: F) -> Result<Self::Out> {
        let mut out = HashMap::with_capacity(self.0.len() * self.1.len());
        for a in self.0.keys() {
            for b in self.1.keys() {
                out.insert((a, b), func((a, b))?);
            }
        }

        Ok(out)
    }

    fn key_name((a, b): (A, B)) -> String {
        format!("{}_{}", a, b)
    }
}

/// Trait that converts solver variables to their values in the last solution
pub trait ConvertVars {
    type Out;
    fn convert<S: LpSolver>(&self, model: &S) -> Result<Self::Out>;
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert<S: LpSolver>(&self, model: &S) -> Result<Self::Out> {
        model.value(*self)
    }
}

impl<K, T: ConvertVars> ConvertVars for TiVec<K, T> {
    type Out = TiVec<K, T::Out>;

    fn convert<S: LpSolver>(&self, model: &S) -> Result<Self::Out> {
        let mut out = TiVec::with_capacity(self.len());
        for e in self.iter() {
            out.push(e.convert(model)?);
        }
        Ok(out)
    }
}

impl<K: Eq + Hash + Copy, T: ConvertVars> ConvertVars for HashMap<K, T> {
    type Out = HashMap<K, T::Out>;

    fn convert<S: LpSolver>(&self, model: &S) -> Result<Self::Out> {
        self.iter()
            .map(|(k, e)| Ok((*k, e.convert(model)?)))
            .collect()
    }
}

/// Trait that converts constraints to their dual prices in the last solution
pub trait ConvertDuals {
    type Out;
    fn duals<S: LpSolver>(&self, model: &S) -> Result<Self::Out>;
}

impl ConvertDuals for Constr {
    type Out = f64;

    fn duals<S: LpSolver>(&self, model: &S) -> Result<Self::Out> {
        model.dual(*self)
    }
}

impl<K, T: ConvertDuals> ConvertDuals for TiVec<K, T> {
    type Out = TiVec<K, T::Out>;

    fn duals<S: LpSolver>(&self, model: &S) -> Result<Self::Out> {
        let mut out = TiVec::with_capacity(self.len());
        for e in self.iter() {
            out.push(e.duals(model)?);
        }
        Ok(out)
    }
}
