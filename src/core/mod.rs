pub mod errors;
pub mod types;
pub mod utils;

pub use errors::{ProvenanceError, ProvenanceResult};
pub use types::*;
