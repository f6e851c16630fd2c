use std::sync::Arc;

use netjobs_compute::ComputeRequest;
use netjobs_core::config::{JobsConfig, WorkerMode};
use tracing::{error, info};

use crate::error::JobError;
use crate::launcher::{Launcher, ProcessLauncher, ThreadLauncher};
use crate::registry::JobStore;
use crate::types::JobId;

/// Validates submissions, registers jobs and hands them to a launcher.
#[derive(Clone)]
pub struct WorkerDispatcher {
    store: Arc<JobStore>,
    launcher: Arc<dyn Launcher>,
}

impl WorkerDispatcher {
    pub fn new(store: Arc<JobStore>, launcher: Arc<dyn Launcher>) -> Self {
        Self { store, launcher }
    }

    /// Pick the launcher named by the jobs configuration.
    pub fn from_config(store: Arc<JobStore>, config: &JobsConfig) -> Self {
        let launcher: Arc<dyn Launcher> = match config.worker_mode {
            WorkerMode::Process => Arc::new(
                ProcessLauncher::new(config.resolved_worker_binary())
                    .kill_on_terminate(config.kill_on_terminate),
            ),
            WorkerMode::Thread => Arc::new(ThreadLauncher::new()),
        };
        Self::new(store, launcher)
    }

    pub fn launcher_kind(&self) -> &'static str {
        self.launcher.kind()
    }

    /// Submit a request on behalf of `owner` and return its job id at once.
    ///
    /// Invalid requests are rejected before a job exists. A unit that fails
    /// to start leaves its job in ERROR; the id is still returned so the
    /// client can observe the failure through `status`/`fetch`.
    pub fn submit(&self, owner: &str, request: ComputeRequest) -> Result<JobId, JobError> {
        request.validate()?;

        let algorithm = request.algorithm;
        let (job, sink, cancel) = self.store.create(algorithm.name(), owner)?;
        info!(
            job_id = %job.id,
            algorithm = %algorithm,
            owner,
            launcher = self.launcher.kind(),
            vertices = request.graph.vertex_count(),
            "job submitted"
        );

        if let Err(e) = self.launcher.launch(&job, request, sink.clone(), cancel) {
            error!(job_id = %job.id, error = %e, "worker launch failed");
            sink.fail(e.to_string());
        }
        Ok(job.id)
    }
}
