//! Wire protocol between the server and an out-of-process worker.
//!
//! The server writes one [`ComputeRequest`](netjobs_compute::ComputeRequest)
//! as JSON to the worker's stdin and closes it. The worker answers with
//! newline-delimited [`WorkerMessage`]s on stdout, ending with exactly one
//! `done` or `failed`. Anything the worker logs goes to stderr.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::StatusSink;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Progress { message: String },
    Done { result: Value },
    Failed { message: String },
}

impl WorkerMessage {
    /// Encode as a single line, newline included.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }

    /// Forward the message into a job's status channel.
    pub fn apply(self, sink: &StatusSink) -> bool {
        match self {
            WorkerMessage::Progress { message } => sink.running(Some(message)),
            WorkerMessage::Done { result } => sink.done(result),
            WorkerMessage::Failed { message } => sink.fail(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::status_channel;
    use crate::types::JobState;
    use serde_json::json;

    #[test]
    fn lines_are_tagged_and_newline_terminated() {
        let line = WorkerMessage::Progress {
            message: "running leiden".into(),
        }
        .to_line()
        .unwrap();
        assert_eq!(line, "{\"type\":\"progress\",\"message\":\"running leiden\"}\n");
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn parses_done_with_result() {
        let msg = WorkerMessage::parse_line(r#"{"type":"done","result":{"community_count":2}}"#).unwrap();
        assert!(msg.is_terminal());
        assert_eq!(
            msg,
            WorkerMessage::Done {
                result: json!({ "community_count": 2 })
            }
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(WorkerMessage::parse_line(r#"{"type":"cancelled"}"#).is_err());
        assert!(WorkerMessage::parse_line("not json").is_err());
    }

    #[test]
    fn apply_drives_the_sink() {
        let (sink, reader) = status_channel();
        WorkerMessage::Progress { message: "started".into() }.apply(&sink);
        assert_eq!(reader.state(), JobState::Running);
        WorkerMessage::Failed { message: "boom".into() }.apply(&sink);
        let record = reader.snapshot();
        assert_eq!(record.status.state, JobState::Error);
        assert_eq!(record.status.message.as_deref(), Some("boom"));
    }
}
