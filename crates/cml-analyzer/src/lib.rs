pub mod model;
pub mod semantic;

pub use model::{Model, ModelBuilder, ModelError};
pub use semantic::{analyze, analyze_into};
