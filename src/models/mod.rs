pub mod benders;
pub mod extensive;
pub mod utils;

pub use benders::{BendersSolution, BendersSolver};
pub use extensive::{ExtensiveForm, ExtensiveSolution};
