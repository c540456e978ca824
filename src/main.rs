use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info};

use lshaped::analysis::{evaluate_plan, solve, value_of_stochastic_solution};
use lshaped::config::{ArcCapacityForm, Config, DemandModel, FirstStage, Method};
use lshaped::error::Result;
use lshaped::generate::{random_problem, GeneratorConfig};
use lshaped::parse::{load_problem, save_problem};
use lshaped::report::{stochastic_summary, SolutionReport};
use lshaped::solver::Backend;

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Two-stage stochastic capacity expansion solved with the L-shaped method")]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// solve an instance and print the capacity expansion plan
    Solve {
        /// path to the instance json
        instance: PathBuf,
        #[clap(flatten)]
        options: SolveOptions,
        /// write the solution as json to this file
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// compare the stochastic solution with the solution of the mean-value problem
    Vss {
        /// path to the instance json
        instance: PathBuf,
        #[clap(flatten)]
        options: SolveOptions,
    },
    /// write a random instance
    Generate {
        #[clap(long, default_value_t = 2)]
        facilities: usize,
        #[clap(long, default_value_t = 3)]
        hubs: usize,
        #[clap(long, default_value_t = 4)]
        customers: usize,
        #[clap(long, default_value_t = 5)]
        scenarios: usize,
        #[clap(long, default_value_t = 0)]
        seed: u64,
        /// where to write the instance
        #[clap(short, long)]
        output: PathBuf,
    },
}

#[derive(Parser)]
struct SolveOptions {
    /// json file with the run configuration, flags below take precedence
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// benders or extensive
    #[clap(short, long)]
    method: Option<Method>,
    /// continuous or integer capacity increase
    #[clap(long)]
    first_stage: Option<FirstStage>,
    /// solve the problem with every demand replaced by its average over the scenarios
    #[clap(long)]
    mean_value: bool,
    /// upper-bound or negated-lower-bound arc capacity rows
    #[clap(long)]
    arc_form: Option<ArcCapacityForm>,
    /// threshold for adding a cut
    #[clap(long)]
    epsilon: Option<f64>,
    /// abort the decomposition after this many iterations
    #[clap(long)]
    max_iterations: Option<u64>,
    /// abort the decomposition after this many seconds
    #[clap(long)]
    timeout: Option<u64>,
    /// highs or gurobi
    #[clap(long)]
    solver: Option<Backend>,
}

impl SolveOptions {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(first_stage) = self.first_stage {
            config.first_stage = first_stage;
        }
        if self.mean_value {
            config.demand = DemandModel::MeanValue;
        }
        if let Some(arc_form) = self.arc_form {
            config.arc_form = arc_form;
        }
        if let Some(epsilon) = self.epsilon {
            config.epsilon = epsilon;
        }
        if self.max_iterations.is_some() {
            config.max_iterations = self.max_iterations;
        }
        if self.timeout.is_some() {
            config.timeout = self.timeout;
        }
        if let Some(backend) = self.solver {
            config.backend = backend;
        }

        Ok(config)
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Solve {
            instance,
            options,
            output,
        } => {
            let config = options.config()?;
            let problem = load_problem(&instance)?;
            let plan = solve(&problem, &config)?;

            let evaluated = match config.demand {
                DemandModel::Stochastic => problem,
                DemandModel::MeanValue => problem.mean_value(),
            };
            let evaluation = evaluate_plan(&evaluated, &config, &plan.capacity_increase)?;
            let report = SolutionReport::new(&evaluated, &plan, &evaluation);

            print!("{}", report.summary());
            if let Some(path) = output {
                report.save(path)?;
            }
        }
        Commands::Vss { instance, options } => {
            let config = options.config()?;
            let problem = load_problem(&instance)?;
            let analysis = value_of_stochastic_solution(&problem, &config)?;
            print!("{}", stochastic_summary(&problem, &analysis));
        }
        Commands::Generate {
            facilities,
            hubs,
            customers,
            scenarios,
            seed,
            output,
        } => {
            let raw = random_problem(&GeneratorConfig {
                facilities,
                hubs,
                customers,
                scenarios,
                seed,
            });
            save_problem(&raw, &output)?;
            info!("Wrote random instance to {}", output.display());
        }
    }

    Ok(())
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
