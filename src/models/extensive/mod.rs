pub mod model;

pub use model::{ExtensiveForm, ExtensiveSolution, Variables};
