//! Named job services, one per algorithm, looked up by route name.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use netjobs_compute::{Algorithm, AlgorithmKind, AlgorithmOptions, ComputeRequest};
use netjobs_core::GraphPayload;

use crate::dispatcher::WorkerDispatcher;
use crate::error::JobError;
use crate::types::JobId;

/// A service that turns an uploaded payload plus options into a job.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> AlgorithmKind;

    /// Option names this service reads. Anything else is ignored.
    fn options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Validate and start a job, returning its id without waiting for it.
    async fn submit(&self, payload: &[u8], options: AlgorithmOptions) -> Result<JobId, JobError>;
}

/// The handler backing every algorithm route.
pub struct AlgorithmService {
    algorithm: Algorithm,
    dispatcher: WorkerDispatcher,
}

impl AlgorithmService {
    pub fn new(algorithm: Algorithm, dispatcher: WorkerDispatcher) -> Self {
        Self {
            algorithm,
            dispatcher,
        }
    }
}

#[async_trait]
impl ServiceHandler for AlgorithmService {
    fn name(&self) -> &str {
        self.algorithm.name()
    }

    fn kind(&self) -> AlgorithmKind {
        self.algorithm.kind()
    }

    fn options(&self) -> &'static [&'static str] {
        self.algorithm.option_names()
    }

    async fn submit(&self, payload: &[u8], options: AlgorithmOptions) -> Result<JobId, JobError> {
        let graph = GraphPayload::from_slice(payload)?;
        let request = ComputeRequest::new(self.algorithm, options, graph)?;
        self.dispatcher.submit(self.algorithm.name(), request)
    }
}

/// Registered services in registration order.
#[derive(Default, Clone)]
pub struct ServiceTable {
    services: IndexMap<String, Arc<dyn ServiceHandler>>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`AlgorithmService`] per known algorithm.
    pub fn with_all_algorithms(dispatcher: &WorkerDispatcher) -> Self {
        let mut table = Self::new();
        for algorithm in Algorithm::ALL {
            table.register(Arc::new(AlgorithmService::new(algorithm, dispatcher.clone())));
        }
        table
    }

    /// Register a handler, replacing any earlier one with the same name.
    pub fn register(&mut self, handler: Arc<dyn ServiceHandler>) {
        self.services.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ServiceHandler>, JobError> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::UnknownService(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn ServiceHandler>> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::ThreadLauncher;
    use crate::registry::JobStore;
    use netjobs_core::PayloadError;

    fn table() -> (Arc<JobStore>, ServiceTable) {
        let store = Arc::new(JobStore::new());
        let dispatcher = WorkerDispatcher::new(store.clone(), Arc::new(ThreadLauncher::new()));
        (store, ServiceTable::with_all_algorithms(&dispatcher))
    }

    #[test]
    fn every_algorithm_is_registered() {
        let (_, table) = table();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(
            names,
            vec![
                "leiden",
                "fastgreedy",
                "infomap",
                "labelpropagation",
                "leadingeigenvector",
                "multilevel",
                "drawgraph"
            ]
        );
        assert_eq!(table.get("drawgraph").unwrap().kind(), AlgorithmKind::Embedding);
    }

    #[test]
    fn unknown_service() {
        let (_, table) = table();
        assert!(matches!(table.get("umap"), Err(JobError::UnknownService(name)) if name == "umap"));
    }

    #[tokio::test]
    async fn missing_edges_creates_no_job() {
        let (store, table) = table();
        let handler = table.get("leiden").unwrap();

        let err = handler
            .submit(br#"{"nodes": ["a", "b"]}"#, AlgorithmOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Malformed(PayloadError::MissingField("edges"))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn bad_json_creates_no_job() {
        let (store, table) = table();
        let err = table
            .get("infomap")
            .unwrap()
            .submit(b"{not json", AlgorithmOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Malformed(PayloadError::Json(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn valid_submission_registers_job() {
        let (store, table) = table();
        let id = table
            .get("multilevel")
            .unwrap()
            .submit(br#"{"edges": [["a", "b", 1]]}"#, AlgorithmOptions::new())
            .await
            .unwrap();

        let entry = store.lookup(id).unwrap();
        assert_eq!(entry.job.algorithm, "multilevel");
        let record = entry.reader.clone().wait_terminal().await;
        assert!(record.status.state.is_terminal());
    }
}
