pub mod analysis;
pub mod config;
pub mod error;
pub mod generate;
pub mod models;
pub mod parse;
pub mod problem;
pub mod report;
pub mod solver;
pub mod termination;

pub use config::Config;
pub use error::{Error, Result};
pub use problem::Problem;
