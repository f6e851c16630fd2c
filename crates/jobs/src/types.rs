use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type JobId = Uuid;

/// Lifecycle state of a job. Termination is not a state: a terminated job
/// no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Error,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }

    /// Position in the state machine; transitions never decrease it.
    pub(crate) fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Running => 1,
            JobState::Done | JobState::Error => 2,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a submitted job. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub algorithm: String,
    /// Name of the service handler that created the job.
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub state: JobState,
    /// Failure reason for ERROR, optional progress text for RUNNING.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn pending() -> Self {
        Self {
            state: JobState::Pending,
            message: None,
            updated_at: Utc::now(),
        }
    }
}

/// Everything the worker side publishes about a job. Replaced whole on
/// every write.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub status: StatusRecord,
    /// Set once, together with the DONE transition.
    pub result: Option<Arc<Value>>,
}

impl JobRecord {
    pub fn pending() -> Self {
        Self {
            status: StatusRecord::pending(),
            result: None,
        }
    }

    /// Status fields followed by result fields, as returned by `fetch`.
    pub fn merged(&self, job: &Job) -> Value {
        let mut out = Map::new();
        out.insert("job_id".to_string(), Value::String(job.id.to_string()));
        out.insert("algorithm".to_string(), Value::String(job.algorithm.clone()));
        out.insert(
            "status".to_string(),
            Value::String(self.status.state.as_str().to_string()),
        );
        if let Some(message) = &self.status.message {
            out.insert("message".to_string(), Value::String(message.clone()));
        }
        out.insert(
            "updated_at".to_string(),
            Value::String(self.status.updated_at.to_rfc3339()),
        );

        match self.result.as_deref() {
            Some(Value::Object(fields)) => {
                for (key, value) in fields {
                    out.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                out.insert("result".to_string(), other.clone());
            }
            None => {}
        }
        Value::Object(out)
    }
}

/// Row of `GET /jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    #[serde(flatten)]
    pub job: Job,
    pub state: JobState,
    pub updated_at: DateTime<Utc>,
}
