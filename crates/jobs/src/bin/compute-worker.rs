//! compute-worker: runs one graph computation in its own process.
//!
//! Reads a `ComputeRequest` as JSON (stdin by default), writes
//! newline-delimited `WorkerMessage`s to stdout and logs to stderr. The
//! last line is always a `done` or `failed` message unless the process
//! itself dies.

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use netjobs_compute::{execute, ComputeRequest};
use netjobs_jobs::WorkerMessage;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "compute-worker", version, about)]
struct Cli {
    /// Read the request from a file instead of stdin.
    #[arg(long, env = "NETJOBS_WORKER_INPUT")]
    input: Option<PathBuf>,
}

fn read_request(cli: &Cli) -> anyhow::Result<Vec<u8>> {
    match &cli.input {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}

struct Emitter<W: Write> {
    out: W,
}

impl<W: Write> Emitter<W> {
    fn emit(&mut self, message: &WorkerMessage) {
        let written = message
            .to_line()
            .map_err(io::Error::from)
            .and_then(|line| {
                self.out.write_all(line.as_bytes())?;
                self.out.flush()
            });
        // A closed pipe means the server stopped listening; keep computing
        // so the exit status still reflects the outcome.
        if let Err(e) = written {
            warn!(error = %e, "could not write to stdout");
        }
    }
}

fn run(request: &ComputeRequest, emitter: &mut Emitter<impl Write>) -> WorkerMessage {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        execute(request, &mut |message: &str| {
            emitter.emit(&WorkerMessage::Progress {
                message: message.to_string(),
            })
        })
    }));
    match outcome {
        Ok(Ok(result)) => WorkerMessage::Done { result },
        Ok(Err(e)) => WorkerMessage::Failed {
            message: e.to_string(),
        },
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            WorkerMessage::Failed {
                message: format!("worker panicked: {reason}"),
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut emitter = Emitter {
        out: BufWriter::new(io::stdout().lock()),
    };

    let raw = read_request(&cli)?;
    let request: ComputeRequest = match serde_json::from_slice(&raw) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "malformed request");
            emitter.emit(&WorkerMessage::Failed {
                message: format!("malformed request: {e}"),
            });
            return Ok(());
        }
    };

    info!(algorithm = %request.algorithm, pid = std::process::id(), "worker started");
    emitter.emit(&WorkerMessage::Progress {
        message: "worker started".to_string(),
    });

    let outcome = run(&request, &mut emitter);
    if let WorkerMessage::Failed { message } = &outcome {
        error!(algorithm = %request.algorithm, message, "computation failed");
    }
    emitter.emit(&outcome);
    Ok(())
}
