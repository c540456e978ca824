use std::fmt::Write as _;
use std::{fs::File, io::BufWriter, io::Write, path::Path};

use float_ord::FloatOrd;
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::{Plan, PlanEvaluation, StochasticAnalysis};
use crate::error::Result;
use crate::models::benders::IterationLog;
use crate::problem::Problem;

/// Values below this are treated as zero in reports
const REPORT_THRESHOLD: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcIncrease {
    pub from: String,
    pub to: String,
    pub increase: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub recourse_cost: f64,
    /// Unmet demand per customer, customers that are fully served are left out
    pub unmet: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: u64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub cuts: usize,
}

impl From<&IterationLog> for IterationReport {
    fn from(log: &IterationLog) -> Self {
        IterationReport {
            iteration: log.iteration,
            lower_bound: log.lower_bound,
            upper_bound: log.upper_bound,
            cuts: log.cuts,
        }
    }
}

/// The written form of a solved instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionReport {
    pub objective: f64,
    pub first_stage_cost: f64,
    pub expected_recourse: f64,
    /// Arcs with a non-zero capacity increase, largest first
    pub capacity_increase: Vec<ArcIncrease>,
    pub scenarios: Vec<ScenarioReport>,
    pub iterations: Vec<IterationReport>,
}

impl SolutionReport {
    pub fn new(problem: &Problem, plan: &Plan, evaluation: &PlanEvaluation) -> SolutionReport {
        let capacity_increase = plan
            .capacity_increase
            .iter_enumerated()
            .filter(|(_, x)| **x > REPORT_THRESHOLD)
            .sorted_by_key(|(_, x)| std::cmp::Reverse(FloatOrd(**x)))
            .map(|(a, x)| {
                let (from, to) = problem.arc_endpoints(a);
                ArcIncrease {
                    from: from.to_string(),
                    to: to.to_string(),
                    increase: *x,
                }
            })
            .collect();

        let scenarios = evaluation
            .scenarios
            .iter_enumerated()
            .map(|(s, e)| ScenarioReport {
                scenario: problem.scenarios()[s].clone(),
                recourse_cost: e.cost,
                unmet: e
                    .unmet
                    .iter_enumerated()
                    .filter(|(_, u)| **u > REPORT_THRESHOLD)
                    .map(|(c, u)| (problem.customers()[c].clone(), *u))
                    .collect(),
            })
            .collect();

        SolutionReport {
            objective: plan.objective,
            first_stage_cost: evaluation.first_stage_cost,
            expected_recourse: evaluation.expected_recourse,
            capacity_increase,
            scenarios,
            iterations: plan.iterations.iter().map(IterationReport::from).collect(),
        }
    }

    /// A plain text summary for the console
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Objective:          {:.4}", self.objective);
        let _ = writeln!(out, "Expansion cost:     {:.4}", self.first_stage_cost);
        let _ = writeln!(out, "Expected recourse:  {:.4}", self.expected_recourse);
        if !self.iterations.is_empty() {
            let _ = writeln!(out, "Iterations:         {}", self.iterations.len());
        }

        if self.capacity_increase.is_empty() {
            let _ = writeln!(out, "No capacity is added");
        } else {
            let _ = writeln!(out, "Capacity increase:");
            for arc in &self.capacity_increase {
                let _ = writeln!(out, "  ({}, {}): {:.4}", arc.from, arc.to, arc.increase);
            }
        }

        for scenario in self.scenarios.iter().filter(|s| !s.unmet.is_empty()) {
            let unmet = scenario
                .unmet
                .iter()
                .map(|(c, u)| format!("{c}: {u:.4}"))
                .join(", ");
            let _ = writeln!(out, "Unmet demand in {}: {}", scenario.scenario, unmet);
        }

        out
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Writing solution to {}", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// A plain text summary of the value of the stochastic solution
pub fn stochastic_summary(problem: &Problem, analysis: &StochasticAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RP  (stochastic optimum):     {:.4}", analysis.recourse_problem);
    let _ = writeln!(out, "MV  (mean-value optimum):     {:.4}", analysis.mean_value);
    let _ = writeln!(out, "EEV (mean-value plan, RP):    {:.4}", analysis.expected_mean_value);
    let _ = writeln!(
        out,
        "VSS (EEV - RP):               {:.4}",
        analysis.value_of_stochastic_solution
    );

    let plan = analysis
        .mean_value_plan
        .iter_enumerated()
        .filter(|(_, x)| **x > REPORT_THRESHOLD)
        .map(|(a, x)| format!("{} {:.4}", problem.arc_name(a), x))
        .join(", ");
    if !plan.is_empty() {
        let _ = writeln!(out, "Mean-value plan: {}", plan);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{evaluate_plan, solve};
    use crate::config::Config;
    use crate::parse::read_problem;

    const BOTTLENECK: &str = r#"{
        "facilities": ["F0"],
        "hubs": ["H0"],
        "customers": ["C0", "C1"],
        "scenarios": ["S0"],
        "arc_expansion_cost": [
            {"from": "F0", "to": "H0", "value": 1.0},
            {"from": "H0", "to": "C0", "value": 1.0},
            {"from": "H0", "to": "C1", "value": 100.0}
        ],
        "facility_capacity": {"F0": 100.0},
        "arc_capacity": [
            {"from": "F0", "to": "H0", "value": 100.0},
            {"from": "H0", "to": "C0", "value": 1.0},
            {"from": "H0", "to": "C1", "value": 1.0}
        ],
        "unmet_cost": {"C0": 10.0, "C1": 10.0},
        "demand": [
            {"customer": "C0", "scenario": "S0", "value": 4.0},
            {"customer": "C1", "scenario": "S0", "value": 3.0}
        ]
    }"#;

    #[test]
    fn report_lists_expansion_and_shortage() {
        let problem = read_problem(BOTTLENECK.as_bytes()).unwrap();
        let config = Config::default();
        let plan = solve(&problem, &config).unwrap();
        let evaluation = evaluate_plan(&problem, &config, &plan.capacity_increase).unwrap();
        let report = SolutionReport::new(&problem, &plan, &evaluation);

        // C0's arc is expanded by 3 for 3, C1 pays 2 * 10 instead of expanding at 100
        assert!((report.objective - 23.0).abs() < 1e-6);
        assert_eq!(report.capacity_increase.len(), 1);
        assert_eq!(report.capacity_increase[0].to, "C0");
        assert_eq!(report.scenarios[0].unmet.len(), 1);
        assert_eq!(report.scenarios[0].unmet[0].0, "C1");

        let summary = report.summary();
        assert!(summary.contains("(H0, C0): 3.0000"));
        assert!(summary.contains("Unmet demand in S0: C1: 2.0000"));
    }
}
