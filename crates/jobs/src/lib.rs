//! Asynchronous job lifecycle: submission, isolated execution, status
//! propagation, polling and termination.

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod launcher;
pub mod lifecycle;
pub mod protocol;
pub mod reaper;
pub mod registry;
pub mod types;

pub use channel::{status_channel, StatusReader, StatusSink};
pub use dispatcher::WorkerDispatcher;
pub use error::JobError;
pub use handler::{AlgorithmService, ServiceHandler, ServiceTable};
pub use launcher::{Launcher, ProcessLauncher, ThreadLauncher};
pub use lifecycle::LifecycleController;
pub use protocol::WorkerMessage;
pub use reaper::spawn_reaper;
pub use registry::{CancelHandle, JobEntry, JobStore};
pub use types::{Job, JobId, JobRecord, JobState, JobSummary, StatusRecord};
