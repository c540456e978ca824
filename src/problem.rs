use derive_more::{Deref, Display, From, Into};
use std::collections::{HashMap, HashSet};
use typed_index_collections::{TiSlice, TiVec};

use crate::parse::{ArcEntry, RawProblem};

/// The type used for capacities and demands
pub type Quantity = f64;
/// The type used for cost.
pub type Cost = f64;

#[derive(Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct FacilityIndex(usize);

#[derive(Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct HubIndex(usize);

#[derive(Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct CustomerIndex(usize);

#[derive(Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct ScenarioIndex(usize);

#[derive(Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct ArcIndex(usize);

/// A directed arc of the distribution network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkArc {
    /// From a facility to a hub
    Inbound(FacilityIndex, HubIndex),
    /// From a hub to a customer
    Outbound(HubIndex, CustomerIndex),
}

#[derive(Debug, Clone, Display, PartialEq)]
pub enum ProblemConstructionError {
    /// One of the four index sets has no members
    #[display(fmt = "the set of {} is empty", set)]
    EmptySet { set: &'static str },
    /// The same name occurs twice within a set
    #[display(fmt = "{} `{}` is listed more than once", set, name)]
    DuplicateName { set: &'static str, name: String },
    /// A table refers to a name that is not part of the expected set
    #[display(fmt = "`{}` refers to unknown {} `{}`", table, set, name)]
    UnknownName {
        table: &'static str,
        set: &'static str,
        name: String,
    },
    /// An arc entry that is neither facility -> hub nor hub -> customer
    #[display(fmt = "`{}` contains ({}, {}) which is not an arc of the network", table, from, to)]
    NotAnArc {
        table: &'static str,
        from: String,
        to: String,
    },
    /// A key is given more than once in a table
    #[display(fmt = "`{}` has more than one entry for {}", table, key)]
    DuplicateEntry { table: &'static str, key: String },
    /// A key is missing from a table
    #[display(fmt = "`{}` has no entry for {}", table, key)]
    MissingEntry { table: &'static str, key: String },
    /// A value is negative, NaN or infinite
    #[display(fmt = "`{}` has invalid value {} for {}", table, value, key)]
    InvalidValue {
        table: &'static str,
        key: String,
        value: f64,
    },
}

impl std::error::Error for ProblemConstructionError {}

/// A two-stage capacity expansion problem on a facility -> hub -> customer network.
///
/// Arcs are stored with all facility -> hub arcs first (facility major), followed by
/// all hub -> customer arcs (hub major).
#[derive(Debug, Clone)]
pub struct Problem {
    facilities: TiVec<FacilityIndex, String>,
    hubs: TiVec<HubIndex, String>,
    customers: TiVec<CustomerIndex, String>,
    scenarios: TiVec<ScenarioIndex, String>,
    arcs: TiVec<ArcIndex, NetworkArc>,
    /// Cost per unit of capacity added to an arc
    expansion_cost: TiVec<ArcIndex, Cost>,
    /// Capacity of each arc before expansion
    arc_capacity: TiVec<ArcIndex, Quantity>,
    /// The total amount a facility can ship
    facility_capacity: TiVec<FacilityIndex, Quantity>,
    /// Penalty per unit of demand that is not delivered
    unmet_cost: TiVec<CustomerIndex, Cost>,
    /// Demand of each customer in each scenario
    demand: TiVec<ScenarioIndex, TiVec<CustomerIndex, Quantity>>,
}

impl Problem {
    pub fn facilities(&self) -> &TiSlice<FacilityIndex, String> {
        &self.facilities
    }

    pub fn hubs(&self) -> &TiSlice<HubIndex, String> {
        &self.hubs
    }

    pub fn customers(&self) -> &TiSlice<CustomerIndex, String> {
        &self.customers
    }

    pub fn scenarios(&self) -> &TiSlice<ScenarioIndex, String> {
        &self.scenarios
    }

    /// All arcs of the network, facility -> hub arcs first
    pub fn arcs(&self) -> &TiSlice<ArcIndex, NetworkArc> {
        &self.arcs
    }

    /// The index of the arc from `facility` to `hub`
    pub fn inbound_arc(&self, facility: FacilityIndex, hub: HubIndex) -> ArcIndex {
        ArcIndex::from(*facility * self.hubs.len() + *hub)
    }

    /// The index of the arc from `hub` to `customer`
    pub fn outbound_arc(&self, hub: HubIndex, customer: CustomerIndex) -> ArcIndex {
        let offset = self.facilities.len() * self.hubs.len();
        ArcIndex::from(offset + *hub * self.customers.len() + *customer)
    }

    pub fn arc_index(&self, arc: NetworkArc) -> ArcIndex {
        match arc {
            NetworkArc::Inbound(f, h) => self.inbound_arc(f, h),
            NetworkArc::Outbound(h, c) => self.outbound_arc(h, c),
        }
    }

    /// Arcs leaving a facility
    pub fn arcs_from_facility(
        &self,
        facility: FacilityIndex,
    ) -> impl Iterator<Item = ArcIndex> + '_ {
        self.hubs.keys().map(move |h| self.inbound_arc(facility, h))
    }

    /// Arcs entering a hub
    pub fn arcs_into_hub(&self, hub: HubIndex) -> impl Iterator<Item = ArcIndex> + '_ {
        self.facilities.keys().map(move |f| self.inbound_arc(f, hub))
    }

    /// Arcs leaving a hub
    pub fn arcs_from_hub(&self, hub: HubIndex) -> impl Iterator<Item = ArcIndex> + '_ {
        self.customers.keys().map(move |c| self.outbound_arc(hub, c))
    }

    /// Arcs entering a customer
    pub fn arcs_into_customer(
        &self,
        customer: CustomerIndex,
    ) -> impl Iterator<Item = ArcIndex> + '_ {
        self.hubs.keys().map(move |h| self.outbound_arc(h, customer))
    }

    pub fn expansion_cost(&self, arc: ArcIndex) -> Cost {
        self.expansion_cost[arc]
    }

    pub fn arc_capacity(&self, arc: ArcIndex) -> Quantity {
        self.arc_capacity[arc]
    }

    pub fn facility_capacity(&self, facility: FacilityIndex) -> Quantity {
        self.facility_capacity[facility]
    }

    pub fn unmet_cost(&self, customer: CustomerIndex) -> Cost {
        self.unmet_cost[customer]
    }

    pub fn demand(&self, scenario: ScenarioIndex, customer: CustomerIndex) -> Quantity {
        self.demand[scenario][customer]
    }

    /// Probability of a scenario. Scenarios are equally likely.
    pub fn probability(&self, _scenario: ScenarioIndex) -> f64 {
        1.0 / self.scenarios.len() as f64
    }

    /// A readable name such as `(F0, H1)`
    pub fn arc_name(&self, arc: ArcIndex) -> String {
        describe_arc(&self.arcs[arc], &self.facilities, &self.hubs, &self.customers)
    }

    /// The names of the endpoints of an arc
    pub fn arc_endpoints(&self, arc: ArcIndex) -> (&str, &str) {
        match self.arcs[arc] {
            NetworkArc::Inbound(f, h) => (self.facilities[f].as_str(), self.hubs[h].as_str()),
            NetworkArc::Outbound(h, c) => (self.hubs[h].as_str(), self.customers[c].as_str()),
        }
    }

    /// The first stage cost of a capacity expansion plan
    pub fn expansion_cost_of(&self, plan: &TiSlice<ArcIndex, f64>) -> Cost {
        plan.iter_enumerated()
            .map(|(a, x)| self.expansion_cost[a] * x)
            .sum()
    }

    /// The deterministic problem where the scenarios are replaced by a single scenario `mean`
    /// holding the average demand of each customer.
    pub fn mean_value(&self) -> Problem {
        let n = self.scenarios.len() as f64;
        let average: TiVec<CustomerIndex, Quantity> = self
            .customers
            .keys()
            .map(|c| self.demand.iter().map(|d| d[c]).sum::<f64>() / n)
            .collect();

        Problem {
            scenarios: vec![String::from("mean")].into(),
            demand: vec![average].into(),
            ..self.clone()
        }
    }

    /// Builds and validates a problem from its raw tables.
    pub fn new(raw: RawProblem) -> Result<Problem, ProblemConstructionError> {
        use ProblemConstructionError::*;

        let facilities = index_set::<FacilityIndex>("facilities", raw.facilities)?;
        let hubs = index_set::<HubIndex>("hubs", raw.hubs)?;
        let customers = index_set::<CustomerIndex>("customers", raw.customers)?;
        let scenarios = index_set::<ScenarioIndex>("scenarios", raw.scenarios)?;

        let mut arcs: TiVec<ArcIndex, NetworkArc> = TiVec::new();
        for f in facilities.names.keys() {
            for h in hubs.names.keys() {
                arcs.push(NetworkArc::Inbound(f, h));
            }
        }
        for h in hubs.names.keys() {
            for c in customers.names.keys() {
                arcs.push(NetworkArc::Outbound(h, c));
            }
        }

        let resolve_arc = |table: &'static str,
                           from: &str,
                           to: &str|
         -> Result<NetworkArc, ProblemConstructionError> {
            if let (Some(f), Some(h)) = (facilities.get(from), hubs.get(to)) {
                return Ok(NetworkArc::Inbound(f, h));
            }
            if let (Some(h), Some(c)) = (hubs.get(from), customers.get(to)) {
                return Ok(NetworkArc::Outbound(h, c));
            }
            Err(NotAnArc {
                table,
                from: from.to_string(),
                to: to.to_string(),
            })
        };

        let arc_table = |table: &'static str,
                         entries: Vec<ArcEntry>|
         -> Result<TiVec<ArcIndex, f64>, ProblemConstructionError> {
            let mut values: HashMap<NetworkArc, f64> = HashMap::new();
            for entry in entries {
                let arc = resolve_arc(table, &entry.from, &entry.to)?;
                let key = format!("({}, {})", entry.from, entry.to);
                check_value(table, &key, entry.value)?;
                if values.insert(arc, entry.value).is_some() {
                    return Err(DuplicateEntry { table, key });
                }
            }

            arcs.iter()
                .map(|arc| {
                    values.get(arc).copied().ok_or_else(|| MissingEntry {
                        table,
                        key: describe_arc(arc, &facilities.names, &hubs.names, &customers.names),
                    })
                })
                .collect()
        };

        let expansion_cost = arc_table("arc_expansion_cost", raw.arc_expansion_cost)?;
        let arc_capacity = arc_table("arc_capacity", raw.arc_capacity)?;
        let facility_capacity =
            facilities.table("facility_capacity", "facility", raw.facility_capacity)?;
        let unmet_cost = customers.table("unmet_cost", "customer", raw.unmet_cost)?;

        let table = "demand";
        let mut demand: TiVec<ScenarioIndex, TiVec<CustomerIndex, Option<f64>>> = scenarios
            .names
            .keys()
            .map(|_| customers.names.keys().map(|_| None).collect())
            .collect();
        for entry in raw.demand {
            let c = customers.get(&entry.customer).ok_or_else(|| UnknownName {
                table,
                set: "customer",
                name: entry.customer.clone(),
            })?;
            let s = scenarios.get(&entry.scenario).ok_or_else(|| UnknownName {
                table,
                set: "scenario",
                name: entry.scenario.clone(),
            })?;
            let key = format!("({}, {})", entry.customer, entry.scenario);
            check_value(table, &key, entry.value)?;
            if demand[s][c].replace(entry.value).is_some() {
                return Err(DuplicateEntry { table, key });
            }
        }
        let demand = demand
            .iter_enumerated()
            .map(|(s, row)| {
                row.iter_enumerated()
                    .map(|(c, value)| {
                        value.ok_or_else(|| MissingEntry {
                            table,
                            key: format!("({}, {})", customers.names[c], scenarios.names[s]),
                        })
                    })
                    .collect::<Result<TiVec<CustomerIndex, f64>, _>>()
            })
            .collect::<Result<TiVec<ScenarioIndex, _>, _>>()?;

        Ok(Problem {
            facilities: facilities.names,
            hubs: hubs.names,
            customers: customers.names,
            scenarios: scenarios.names,
            arcs,
            expansion_cost,
            arc_capacity,
            facility_capacity,
            unmet_cost,
            demand,
        })
    }
}

/// The names of one index set along with a reverse lookup
struct IndexSet<K> {
    names: TiVec<K, String>,
    lookup: HashMap<String, K>,
}

impl<K: From<usize> + Into<usize> + Copy> IndexSet<K> {
    fn get(&self, name: &str) -> Option<K> {
        self.lookup.get(name).copied()
    }

    /// Resolves a table keyed by the names of this set into a dense vector
    fn table(
        &self,
        table: &'static str,
        singular: &'static str,
        values: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<TiVec<K, f64>, ProblemConstructionError> {
        use ProblemConstructionError::*;

        let mut dense: TiVec<K, Option<f64>> = self.names.keys().map(|_| None).collect();
        for (name, value) in values {
            let k = self.get(&name).ok_or_else(|| UnknownName {
                table,
                set: singular,
                name: name.clone(),
            })?;
            check_value(table, &name, value)?;
            if dense[k].replace(value).is_some() {
                return Err(DuplicateEntry { table, key: name });
            }
        }

        dense
            .iter_enumerated()
            .map(|(k, value)| {
                value.ok_or_else(|| MissingEntry {
                    table,
                    key: self.names[k].clone(),
                })
            })
            .collect()
    }
}

fn index_set<K: From<usize> + Into<usize> + Copy>(
    set: &'static str,
    names: Vec<String>,
) -> Result<IndexSet<K>, ProblemConstructionError> {
    if names.is_empty() {
        return Err(ProblemConstructionError::EmptySet { set });
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(ProblemConstructionError::DuplicateName {
                set,
                name: name.clone(),
            });
        }
    }

    let names: TiVec<K, String> = names.into();
    let lookup = names
        .iter_enumerated()
        .map(|(k, name)| (name.clone(), k))
        .collect();

    Ok(IndexSet { names, lookup })
}

fn check_value(table: &'static str, key: &str, value: f64) -> Result<(), ProblemConstructionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ProblemConstructionError::InvalidValue {
            table,
            key: key.to_string(),
            value,
        })
    }
}

fn describe_arc(
    arc: &NetworkArc,
    facilities: &TiSlice<FacilityIndex, String>,
    hubs: &TiSlice<HubIndex, String>,
    customers: &TiSlice<CustomerIndex, String>,
) -> String {
    match *arc {
        NetworkArc::Inbound(f, h) => format!("({}, {})", facilities[f], hubs[h]),
        NetworkArc::Outbound(h, c) => format!("({}, {})", hubs[h], customers[c]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::DemandEntry;

    fn raw() -> RawProblem {
        let arc = |from: &str, to: &str, value: f64| ArcEntry {
            from: from.to_string(),
            to: to.to_string(),
            value,
        };
        RawProblem {
            facilities: vec!["F0".into(), "F1".into()],
            hubs: vec!["H0".into()],
            customers: vec!["C0".into(), "C1".into()],
            scenarios: vec!["S0".into(), "S1".into()],
            arc_expansion_cost: vec![
                arc("F0", "H0", 1.0),
                arc("F1", "H0", 2.0),
                arc("H0", "C0", 3.0),
                arc("H0", "C1", 4.0),
            ],
            facility_capacity: [("F0".to_string(), 10.0), ("F1".to_string(), 20.0)]
                .into_iter()
                .collect(),
            arc_capacity: vec![
                arc("F0", "H0", 5.0),
                arc("F1", "H0", 6.0),
                arc("H0", "C0", 7.0),
                arc("H0", "C1", 8.0),
            ],
            unmet_cost: [("C0".to_string(), 100.0), ("C1".to_string(), 50.0)]
                .into_iter()
                .collect(),
            demand: vec![
                DemandEntry {
                    customer: "C0".into(),
                    scenario: "S0".into(),
                    value: 2.0,
                },
                DemandEntry {
                    customer: "C1".into(),
                    scenario: "S0".into(),
                    value: 4.0,
                },
                DemandEntry {
                    customer: "C0".into(),
                    scenario: "S1".into(),
                    value: 6.0,
                },
                DemandEntry {
                    customer: "C1".into(),
                    scenario: "S1".into(),
                    value: 0.0,
                },
            ],
        }
    }

    #[test]
    fn arcs_are_laid_out_facility_major_then_hub_major() {
        let problem = Problem::new(raw()).unwrap();
        assert_eq!(problem.arcs().len(), 4);

        let f1 = FacilityIndex::from(1);
        let h0 = HubIndex::from(0);
        let c1 = CustomerIndex::from(1);

        let a = problem.inbound_arc(f1, h0);
        assert_eq!(problem.arcs()[a], NetworkArc::Inbound(f1, h0));
        assert_eq!(problem.expansion_cost(a), 2.0);
        assert_eq!(problem.arc_capacity(a), 6.0);

        let b = problem.outbound_arc(h0, c1);
        assert_eq!(problem.arcs()[b], NetworkArc::Outbound(h0, c1));
        assert_eq!(problem.arc_index(NetworkArc::Outbound(h0, c1)), b);
        assert_eq!(problem.expansion_cost(b), 4.0);
        assert_eq!(problem.arc_name(b), "(H0, C1)");

        assert_eq!(problem.arcs_into_hub(h0).count(), 2);
        assert_eq!(problem.arcs_from_hub(h0).count(), 2);
        assert_eq!(problem.arcs_from_facility(f1).collect::<Vec<_>>(), vec![a]);
        assert_eq!(problem.arcs_into_customer(c1).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn tables_are_resolved_by_name() {
        let problem = Problem::new(raw()).unwrap();
        assert_eq!(problem.facility_capacity(FacilityIndex::from(1)), 20.0);
        assert_eq!(problem.unmet_cost(CustomerIndex::from(1)), 50.0);
        assert_eq!(
            problem.demand(ScenarioIndex::from(1), CustomerIndex::from(0)),
            6.0
        );
        assert_eq!(problem.probability(ScenarioIndex::from(0)), 0.5);
    }

    #[test]
    fn mean_value_averages_demand() {
        let problem = Problem::new(raw()).unwrap().mean_value();
        assert_eq!(problem.scenarios().len(), 1);
        let s = ScenarioIndex::from(0);
        assert_eq!(problem.demand(s, CustomerIndex::from(0)), 4.0);
        assert_eq!(problem.demand(s, CustomerIndex::from(1)), 2.0);
        assert_eq!(problem.probability(s), 1.0);
    }

    #[test]
    fn missing_demand_is_rejected() {
        let mut raw = raw();
        raw.demand.pop();
        assert_eq!(
            Problem::new(raw).unwrap_err(),
            ProblemConstructionError::MissingEntry {
                table: "demand",
                key: "(C1, S1)".to_string()
            }
        );
    }

    #[test]
    fn missing_arc_is_rejected() {
        let mut raw = raw();
        raw.arc_capacity.remove(2);
        assert_eq!(
            Problem::new(raw).unwrap_err(),
            ProblemConstructionError::MissingEntry {
                table: "arc_capacity",
                key: "(H0, C0)".to_string()
            }
        );
    }

    #[test]
    fn arc_between_facility_and_customer_is_rejected() {
        let mut raw = raw();
        raw.arc_expansion_cost.push(ArcEntry {
            from: "F0".into(),
            to: "C0".into(),
            value: 1.0,
        });
        assert!(matches!(
            Problem::new(raw),
            Err(ProblemConstructionError::NotAnArc { .. })
        ));
    }

    #[test]
    fn unknown_and_negative_entries_are_rejected() {
        let mut unknown = raw();
        unknown.unmet_cost.insert("C9".into(), 1.0);
        assert!(matches!(
            Problem::new(unknown),
            Err(ProblemConstructionError::UnknownName { .. })
        ));

        let mut negative = raw();
        negative.facility_capacity.insert("F0".into(), -1.0);
        assert!(matches!(
            Problem::new(negative),
            Err(ProblemConstructionError::InvalidValue { .. })
        ));

        let mut duplicate = raw();
        duplicate.hubs.push("H0".into());
        assert!(matches!(
            Problem::new(duplicate),
            Err(ProblemConstructionError::DuplicateName { .. })
        ));

        let mut empty = raw();
        empty.scenarios.clear();
        empty.demand.clear();
        assert_eq!(
            Problem::new(empty).unwrap_err(),
            ProblemConstructionError::EmptySet { set: "scenarios" }
        );
    }
}
