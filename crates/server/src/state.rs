use std::sync::Arc;

use netjobs_core::Config;
use netjobs_jobs::{JobStore, LifecycleController, ServiceTable, WorkerDispatcher};

/// Shared state handed to every request handler.
pub struct AppState {
    pub config: Config,
    pub store: Arc<JobStore>,
    pub services: ServiceTable,
    pub lifecycle: LifecycleController,
}

impl AppState {
    pub fn new(config: Config, store: Arc<JobStore>, services: ServiceTable) -> Self {
        let lifecycle = LifecycleController::new(store.clone());
        Self {
            config,
            store,
            services,
            lifecycle,
        }
    }

    /// Build the registry, dispatcher and service table the config describes.
    pub fn from_config(config: Config) -> Self {
        let store = Arc::new(JobStore::new());
        let dispatcher = WorkerDispatcher::from_config(store.clone(), &config.jobs);
        let services = ServiceTable::with_all_algorithms(&dispatcher);
        Self::new(config, store, services)
    }
}
