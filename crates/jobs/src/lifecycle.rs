use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::JobError;
use crate::registry::JobStore;
use crate::types::{JobId, JobState, JobSummary};

/// Client-facing view of the registry: poll, fetch and terminate.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    store: Arc<JobStore>,
}

impl LifecycleController {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    pub fn status(&self, id: JobId) -> Result<JobState, JobError> {
        Ok(self.store.lookup(id)?.reader.state())
    }

    /// The job's record merged with its result, if any. Two fetches of a
    /// finished job serialize identically.
    pub fn fetch(&self, id: JobId) -> Result<Value, JobError> {
        let entry = self.store.lookup(id)?;
        Ok(entry.reader.snapshot().merged(&entry.job))
    }

    /// Forget a job and signal its worker. Idempotent: returns whether the
    /// job was still registered.
    pub fn terminate(&self, id: JobId) -> bool {
        match self.store.remove(id) {
            Ok(entry) => {
                entry.cancel.cancel();
                info!(job_id = %id, state = %entry.reader.state(), "job terminated");
                true
            }
            Err(_) => {
                debug!(job_id = %id, "terminate on unknown job");
                false
            }
        }
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.store.list()
    }
}
