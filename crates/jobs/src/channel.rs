//! Status/result handoff between a worker and the registry.
//!
//! A `watch` channel carries the whole [`JobRecord`]. The single writer
//! replaces the record on each transition and readers clone the latest
//! value, so a reader can never observe a half-written result.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;

use crate::types::{JobRecord, JobState, StatusRecord};

/// Create a channel whose record starts in PENDING.
pub fn status_channel() -> (StatusSink, StatusReader) {
    let (tx, rx) = watch::channel(JobRecord::pending());
    (StatusSink { tx: Arc::new(tx) }, StatusReader { rx })
}

/// Writer half, owned by the worker side (launcher and supervisor).
///
/// Enforces the state machine: writes that would move the job backwards,
/// and every write after a terminal state, are dropped. Each method
/// returns whether the write was applied.
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: Arc<watch::Sender<JobRecord>>,
}

impl StatusSink {
    pub fn running(&self, message: Option<String>) -> bool {
        self.transition(JobState::Running, message, None)
    }

    pub fn done(&self, result: Value) -> bool {
        self.transition(JobState::Done, None, Some(Arc::new(result)))
    }

    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.transition(JobState::Error, Some(message.into()), None)
    }

    pub fn state(&self) -> JobState {
        self.tx.borrow().status.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn subscribe(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }

    fn transition(
        &self,
        state: JobState,
        message: Option<String>,
        result: Option<Arc<Value>>,
    ) -> bool {
        self.tx.send_if_modified(|record| {
            let current = record.status.state;
            if current.is_terminal() || state.rank() < current.rank() {
                return false;
            }
            *record = JobRecord {
                status: StatusRecord {
                    state,
                    message,
                    updated_at: Utc::now(),
                },
                result,
            };
            true
        })
    }
}

/// Reader half, held by the registry entry.
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<JobRecord>,
}

impl StatusReader {
    pub fn snapshot(&self) -> JobRecord {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> JobState {
        self.rx.borrow().status.state
    }

    /// Wait until the job is terminal. If every writer is gone first, the
    /// last record is returned as-is.
    pub async fn wait_terminal(&mut self) -> JobRecord {
        if let Ok(record) = self.rx.wait_for(|r| r.status.state.is_terminal()).await {
            return record.clone();
        }
        self.snapshot()
    }
}
