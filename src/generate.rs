use std::collections::BTreeMap;

use itertools::iproduct;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::parse::{ArcEntry, DemandEntry, RawProblem};

/// Dimensions of a random instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub facilities: usize,
    pub hubs: usize,
    pub customers: usize,
    pub scenarios: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            facilities: 2,
            hubs: 3,
            customers: 4,
            scenarios: 5,
            seed: 0,
        }
    }
}

fn names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

/// Rounds to two decimals
fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generates a random instance. The same config always gives the same instance.
///
/// Unmet demand penalties exceed the cost of any path, so expanding capacity is usually
/// worthwhile for the scenarios with high demand.
pub fn random_problem(config: &GeneratorConfig) -> RawProblem {
    info!("Generating random problem {:?}", config);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let facilities = names("F", config.facilities);
    let hubs = names("H", config.hubs);
    let customers = names("C", config.customers);
    let scenarios = names("S", config.scenarios);

    let arcs: Vec<(String, String)> = iproduct!(facilities.iter(), hubs.iter())
        .chain(iproduct!(hubs.iter(), customers.iter()))
        .map(|(from, to)| (from.clone(), to.clone()))
        .collect();

    let arc_expansion_cost = arcs
        .iter()
        .map(|(from, to)| ArcEntry {
            from: from.clone(),
            to: to.clone(),
            value: round(rng.gen_range(1.0..5.0)),
        })
        .collect();
    let arc_capacity = arcs
        .iter()
        .map(|(from, to)| ArcEntry {
            from: from.clone(),
            to: to.clone(),
            value: round(rng.gen_range(0.0..20.0)),
        })
        .collect();

    let facility_capacity: BTreeMap<String, f64> = facilities
        .iter()
        .map(|f| (f.clone(), round(rng.gen_range(20.0..60.0))))
        .collect();
    let unmet_cost: BTreeMap<String, f64> = customers
        .iter()
        .map(|c| (c.clone(), round(rng.gen_range(10.0..30.0))))
        .collect();

    let demand = iproduct!(customers.iter(), scenarios.iter())
        .map(|(c, s)| DemandEntry {
            customer: c.clone(),
            scenario: s.clone(),
            value: round(rng.gen_range(0.0..25.0)),
        })
        .collect();

    RawProblem {
        facilities,
        hubs,
        customers,
        scenarios,
        arc_expansion_cost,
        facility_capacity,
        arc_capacity,
        unmet_cost,
        demand,
    }
}
