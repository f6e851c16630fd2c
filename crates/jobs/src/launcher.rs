//! Launchers start the isolated execution unit for one job and attach a
//! supervisor to it.
//!
//! Whatever happens to the unit, its supervisor guarantees the job ends in
//! a terminal state: a unit that stops without reporting DONE or ERROR
//! is marked ERROR with a description of how it ended.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use netjobs_compute::{ComputeError, ComputeRequest};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::StatusSink;
use crate::protocol::WorkerMessage;
use crate::registry::CancelHandle;
use crate::types::{Job, JobId};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Strategy for running one job in isolation.
pub trait Launcher: Send + Sync {
    /// Short name for logs (`process`, `thread`).
    fn kind(&self) -> &'static str;

    /// Start the unit and its supervisor, then return without waiting.
    fn launch(
        &self,
        job: &Job,
        request: ComputeRequest,
        sink: StatusSink,
        cancel: CancelHandle,
    ) -> Result<(), LaunchError>;
}

// ── Process launcher ────────────────────────────────────────────────

/// Runs each job in its own `compute-worker` process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    kill_on_terminate: bool,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            kill_on_terminate: false,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kill the worker when its job is terminated.
    pub fn kill_on_terminate(mut self, enabled: bool) -> Self {
        self.kill_on_terminate = enabled;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Launcher for ProcessLauncher {
    fn kind(&self) -> &'static str {
        "process"
    }

    fn launch(
        &self,
        job: &Job,
        request: ComputeRequest,
        sink: StatusSink,
        cancel: CancelHandle,
    ) -> Result<(), LaunchError> {
        let input = serde_json::to_vec(&request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        info!(job_id = %job.id, pid = ?child.id(), "worker process started");

        if let Some(mut stdin) = child.stdin.take() {
            let job_id = job.id;
            tokio::spawn(async move {
                // The worker may exit before reading everything.
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(job_id = %job_id, error = %e, "worker stdin closed early");
                }
            });
        }

        let Some(stdout) = child.stdout.take() else {
            sink.fail("worker stdout was not captured");
            return Ok(());
        };

        tokio::spawn(supervise_process(
            job.id,
            child,
            stdout,
            sink,
            cancel,
            self.kill_on_terminate,
        ));
        Ok(())
    }
}

async fn supervise_process(
    job_id: JobId,
    mut child: Child,
    stdout: ChildStdout,
    sink: StatusSink,
    cancel: CancelHandle,
    kill_on_terminate: bool,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut killed = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match WorkerMessage::parse_line(&line) {
                        Ok(message) => {
                            message.apply(&sink);
                        }
                        Err(e) => {
                            warn!(job_id = %job_id, error = %e, "ignoring malformed worker output");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "failed to read worker output");
                    break;
                }
            },
            _ = cancel.cancelled(), if kill_on_terminate && !killed => {
                info!(job_id = %job_id, "killing worker of terminated job");
                if let Err(e) = child.start_kill() {
                    warn!(job_id = %job_id, error = %e, "failed to kill worker");
                }
                killed = true;
                sink.fail("terminated");
            }
        }
    }

    match child.wait().await {
        Ok(status) => settle(job_id, &sink, &describe_exit(status)),
        Err(e) => settle(job_id, &sink, &format!("worker could not be awaited: {}", e)),
    }
}

fn describe_exit(status: ExitStatus) -> String {
    format!("worker exited unexpectedly: {}", status)
}

/// Mark the job ERROR if the unit ended without a terminal report.
fn settle(job_id: JobId, sink: &StatusSink, reason: &str) {
    if sink.fail(reason) {
        warn!(job_id = %job_id, reason, "worker ended without a result");
    } else {
        debug!(job_id = %job_id, state = %sink.state(), "worker finished");
    }
}

// ── Thread launcher ─────────────────────────────────────────────────

/// Function run inside a worker thread.
pub type Executor =
    Arc<dyn Fn(&ComputeRequest, &mut dyn FnMut(&str)) -> Result<Value, ComputeError> + Send + Sync>;

/// Runs each job on the blocking thread pool with panic capture.
///
/// Jobs cannot be killed in this mode; terminate only stops tracking.
#[derive(Clone)]
pub struct ThreadLauncher {
    executor: Executor,
}

impl ThreadLauncher {
    pub fn new() -> Self {
        Self::with_executor(Arc::new(netjobs_compute::execute))
    }

    pub fn with_executor(executor: Executor) -> Self {
        Self { executor }
    }
}

impl Default for ThreadLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ThreadLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadLauncher").finish_non_exhaustive()
    }
}

impl Launcher for ThreadLauncher {
    fn kind(&self) -> &'static str {
        "thread"
    }

    fn launch(
        &self,
        job: &Job,
        request: ComputeRequest,
        sink: StatusSink,
        _cancel: CancelHandle,
    ) -> Result<(), LaunchError> {
        let executor = self.executor.clone();
        let worker_sink = sink.clone();
        let handle =
            tokio::task::spawn_blocking(move || run_in_thread(&executor, &request, &worker_sink));
        tokio::spawn(supervise_thread(job.id, handle, sink));
        Ok(())
    }
}

fn run_in_thread(executor: &Executor, request: &ComputeRequest, sink: &StatusSink) {
    sink.running(Some("worker started".to_string()));
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        executor(request, &mut |message: &str| {
            sink.running(Some(message.to_string()));
        })
    }));
    match outcome {
        Ok(Ok(result)) => {
            sink.done(result);
        }
        Ok(Err(e)) => {
            sink.fail(e.to_string());
        }
        Err(panic) => {
            sink.fail(format!("worker panicked: {}", panic_message(panic.as_ref())));
        }
    }
}

async fn supervise_thread(job_id: JobId, handle: JoinHandle<()>, sink: StatusSink) {
    let reason = match handle.await {
        Ok(()) => "worker thread exited without a result".to_string(),
        Err(e) => format!("worker thread failed: {}", e),
    };
    settle(job_id, &sink, &reason);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobStore;
    use crate::types::JobState;
    use netjobs_compute::{Algorithm, AlgorithmOptions};
    use netjobs_core::GraphPayload;
    use serde_json::json;
    use std::time::Duration;

    fn request() -> ComputeRequest {
        let graph = GraphPayload::from_value(&json!({
            "edges": [["a", "b", 1.0], ["b", "c", 1.0], ["c", "a", 1.0]],
        }))
        .unwrap();
        ComputeRequest::new(Algorithm::Fastgreedy, AlgorithmOptions::new(), graph).unwrap()
    }

    fn executor(f: fn(&ComputeRequest) -> Result<Value, ComputeError>) -> Executor {
        Arc::new(move |request: &ComputeRequest, _progress: &mut dyn FnMut(&str)| f(request))
    }

    async fn run(launcher: &dyn Launcher) -> crate::types::JobRecord {
        let store = JobStore::new();
        let (job, sink, cancel) = store.create("fastgreedy", "fastgreedy").unwrap();
        launcher.launch(&job, request(), sink, cancel).unwrap();
        let mut reader = store.lookup(job.id).unwrap().reader;
        tokio::time::timeout(Duration::from_secs(10), reader.wait_terminal())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn thread_launcher_completes_job() {
        let record = run(&ThreadLauncher::new()).await;
        assert_eq!(record.status.state, JobState::Done);
        assert_eq!(record.result.unwrap()["community_count"], json!(1));
    }

    #[tokio::test]
    async fn thread_launcher_captures_panics() {
        let launcher = ThreadLauncher::with_executor(executor(|_| panic!("index out of bounds")));
        let record = run(&launcher).await;
        assert_eq!(record.status.state, JobState::Error);
        assert!(record.status.message.unwrap().contains("index out of bounds"));
    }

    #[tokio::test]
    async fn thread_launcher_reports_compute_errors() {
        let launcher = ThreadLauncher::with_executor(executor(|_| {
            Err(ComputeError::Failed("layout diverged".into()))
        }));
        let record = run(&launcher).await;
        assert_eq!(record.status.state, JobState::Error);
        assert_eq!(record.status.message.as_deref(), Some("computation failed: layout diverged"));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let store = JobStore::new();
        let (job, sink, cancel) = store.create("fastgreedy", "fastgreedy").unwrap();
        let launcher = ProcessLauncher::new("/nonexistent/compute-worker");
        let err = launcher.launch(&job, request(), sink, cancel).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_exit_is_marked_error() {
        let launcher = ProcessLauncher::new("/bin/sh").with_args(["-c", "exit 3"]);
        let record = run(&launcher).await;
        assert_eq!(record.status.state, JobState::Error);
        assert_eq!(
            record.status.message.as_deref(),
            Some("worker exited unexpectedly: exit status: 3")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scripted_worker_protocol_is_followed() {
        let script = r#"cat > /dev/null
echo '{"type":"progress","message":"warming up"}'
echo 'garbage line'
echo '{"type":"done","result":{"community_count":7}}'
exit 1"#;
        let launcher = ProcessLauncher::new("/bin/sh").with_args(["-c", script]);
        let record = run(&launcher).await;
        assert_eq!(record.status.state, JobState::Done);
        assert_eq!(record.result.unwrap()["community_count"], json!(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_on_terminate_stops_the_worker() {
        let store = JobStore::new();
        let (job, sink, cancel) = store.create("fastgreedy", "fastgreedy").unwrap();
        let launcher = ProcessLauncher::new("/bin/sh")
            .with_args(["-c", "exec sleep 30"])
            .kill_on_terminate(true);
        let mut reader = sink.subscribe();
        launcher.launch(&job, request(), sink, cancel.clone()).unwrap();

        store.remove(job.id).unwrap();
        cancel.cancel();
        let record = tokio::time::timeout(Duration::from_secs(5), reader.wait_terminal())
            .await
            .unwrap();
        assert_eq!(record.status.state, JobState::Error);
        assert_eq!(record.status.message.as_deref(), Some("terminated"));
    }
}
