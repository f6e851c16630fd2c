pub mod algorithms;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod options;

pub use catalog::{Algorithm, AlgorithmKind};
pub use engine::{execute, ComputeRequest};
pub use error::ComputeError;
pub use options::AlgorithmOptions;
