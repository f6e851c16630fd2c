use netjobs_core::PayloadError;

/// Error type for algorithm execution.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error(transparent)]
    InvalidInput(#[from] PayloadError),
    #[error("computation failed: {0}")]
    Failed(String),
}
