use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response; `message` is the server's `error` field when present.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unexpected job status '{0}'")]
    UnknownStatus(String),

    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("job {job_id} did not finish within {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("edge list line {line}: {reason}")]
    EdgeList { line: usize, reason: String },
}
