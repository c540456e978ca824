use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{error::Result, problem::Problem};

/// A value attached to an arc, identified by the names of its endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcEntry {
    pub from: String,
    pub to: String,
    pub value: f64,
}

/// The demand of a customer in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandEntry {
    pub customer: String,
    pub scenario: String,
    pub value: f64,
}

/// The on-disk form of a problem instance, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProblem {
    /// Names of the facilities
    pub facilities: Vec<String>,
    /// Names of the hubs (warehouses)
    pub hubs: Vec<String>,
    /// Names of the customers
    pub customers: Vec<String>,
    /// Names of the demand scenarios
    pub scenarios: Vec<String>,
    /// Cost per unit of added capacity, for every facility -> hub and hub -> customer arc
    pub arc_expansion_cost: Vec<ArcEntry>,
    /// Throughput capacity per facility
    pub facility_capacity: BTreeMap<String, f64>,
    /// Current capacity, for every facility -> hub and hub -> customer arc
    pub arc_capacity: Vec<ArcEntry>,
    /// Penalty per unit of unmet demand per customer
    pub unmet_cost: BTreeMap<String, f64>,
    /// Demand per (customer, scenario)
    pub demand: Vec<DemandEntry>,
}

/// Reads and validates a problem from JSON.
pub fn read_problem<R: Read>(reader: R) -> Result<Problem> {
    let raw: RawProblem = serde_json::from_reader(reader)?;
    debug!(
        "Read {} facilities, {} hubs, {} customers and {} scenarios",
        raw.facilities.len(),
        raw.hubs.len(),
        raw.customers.len(),
        raw.scenarios.len()
    );
    Ok(Problem::new(raw)?)
}

/// Loads a problem instance from a JSON file. Missing or malformed entries are fatal.
pub fn load_problem<P: AsRef<Path>>(path: P) -> Result<Problem> {
    let path = path.as_ref();
    info!("Loading problem from {}", path.display());
    let file = File::open(path)?;
    read_problem(BufReader::new(file))
}

/// Writes a raw problem as pretty printed JSON
pub fn write_problem<W: Write>(raw: &RawProblem, writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, raw)?;
    writer.flush()?;
    Ok(())
}

/// Saves a raw problem to a JSON file
pub fn save_problem<P: AsRef<Path>>(raw: &RawProblem, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Writing problem to {}", path.display());
    write_problem(raw, File::create(path)?)
}
