use typed_index_collections::{TiSlice, TiVec};

use crate::problem::{ArcIndex, ScenarioIndex};

/// An optimality cut `theta_s >= constant + sum_a coefficients[a] * x_a`, a supporting
/// hyperplane of the recourse cost of one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    pub scenario: ScenarioIndex,
    pub constant: f64,
    pub coefficients: TiVec<ArcIndex, f64>,
}

impl Cut {
    /// The recourse cost the cut predicts for a capacity increase
    pub fn height(&self, capacity_increase: &TiSlice<ArcIndex, f64>) -> f64 {
        self.constant
            + self
                .coefficients
                .iter()
                .zip(capacity_increase.iter())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    /// By how much `theta` underestimates the cut at the given point, zero if it does not
    pub fn violation(&self, capacity_increase: &TiSlice<ArcIndex, f64>, theta: f64) -> f64 {
        (self.height(capacity_increase) - theta).max(0.0)
    }
}
