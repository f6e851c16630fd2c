use netjobs_compute::ComputeError;
use netjobs_core::PayloadError;
use thiserror::Error;

use crate::types::JobId;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("no such job: {0}")]
    NotFound(JobId),

    /// Submission rejected before any job was created.
    #[error(transparent)]
    Malformed(#[from] PayloadError),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("job store is shutting down")]
    ShuttingDown,
}

impl From<ComputeError> for JobError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::InvalidInput(e) => JobError::Malformed(e),
            ComputeError::UnknownAlgorithm(name) => JobError::UnknownService(name),
            ComputeError::Failed(reason) => JobError::Rejected(reason),
        }
    }
}
