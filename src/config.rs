use std::{fs::File, io::BufReader, path::Path, str::FromStr};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::solver::Backend;

/// How the stochastic program is solved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// The L-shaped method, alternating between master problem and scenario subproblems
    Benders,
    /// A single LP holding the recourse variables of every scenario
    Extensive,
}

/// The domain of the capacity increase variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstStage {
    Continuous,
    Integer,
}

/// Whether demand is taken from the scenarios or replaced by its average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemandModel {
    Stochastic,
    MeanValue,
}

/// Orientation of the rows linking shipments to arc capacity in the recourse problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArcCapacityForm {
    /// `ship <= capacity + increase`
    UpperBound,
    /// `-ship >= -capacity - increase`
    NegatedLowerBound,
}

macro_rules! named_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($ty::$variant => write!(f, $name)),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(format!(
                        "unknown {} `{}`, expected one of: {}",
                        stringify!($ty),
                        s,
                        [$($name),+].join(", ")
                    )),
                }
            }
        }
    };
}

named_enum!(Method { Benders => "benders", Extensive => "extensive" });
named_enum!(FirstStage { Continuous => "continuous", Integer => "integer" });
named_enum!(DemandModel { Stochastic => "stochastic", MeanValue => "mean-value" });
named_enum!(ArcCapacityForm {
    UpperBound => "upper-bound",
    NegatedLowerBound => "negated-lower-bound",
});

/// Parameters of a run. Every field has a default, so a config file only needs to list
/// what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub method: Method,
    pub first_stage: FirstStage,
    pub demand: DemandModel,
    pub arc_form: ArcCapacityForm,
    /// A cut is added when the recourse cost exceeds theta by more than this
    pub epsilon: f64,
    /// Abort the decomposition after this many iterations
    pub max_iterations: Option<u64>,
    /// Abort the decomposition after this many seconds
    pub timeout: Option<u64>,
    pub backend: Backend,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            method: Method::Benders,
            first_stage: FirstStage::Continuous,
            demand: DemandModel::Stochastic,
            arc_form: ArcCapacityForm::UpperBound,
            epsilon: 1e-6,
            max_iterations: None,
            timeout: None,
            backend: Backend::default(),
        }
    }
}

impl Config {
    /// Reads a config from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        info!("Loading config from {}", path.display());
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
