use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub jobs: JobsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `NETJOBS_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("NETJOBS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            jobs: JobsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  server:  {}:{} (cors={}, max_upload={}MB)",
            self.server.host,
            self.server.port,
            self.server.cors_origin,
            self.server.max_upload_mb
        );
        tracing::info!(
            "  workers: mode={}, binary={}",
            self.jobs.worker_mode,
            self.jobs
                .worker_binary
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(next to executable)".to_string())
        );
        tracing::info!(
            "  jobs:    kill_on_terminate={}, ttl={}",
            self.jobs.kill_on_terminate,
            if self.jobs.job_ttl_secs == 0 {
                "never".to_string()
            } else {
                format!("{}s", self.jobs.job_ttl_secs)
            }
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub max_upload_mb: u64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            max_upload_mb: profiled_env_u64(p, "MAX_UPLOAD_MB", 256),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: "*".to_string(),
            max_upload_mb: 256,
        }
    }
}

// ── Jobs ──────────────────────────────────────────────────────

/// How submitted computations are isolated from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// One OS process per job (the `compute-worker` binary).
    Process,
    /// One blocking-pool thread per job, panics captured.
    Thread,
}

impl FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "process" => Ok(Self::Process),
            "thread" => Ok(Self::Thread),
            other => Err(format!("unknown worker mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerMode::Process => write!(f, "process"),
            WorkerMode::Thread => write!(f, "thread"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub worker_mode: WorkerMode,
    /// Explicit path to the worker binary. `None` = `compute-worker` next to
    /// the running executable.
    pub worker_binary: Option<PathBuf>,
    /// Kill the worker process when its job is terminated.
    pub kill_on_terminate: bool,
    /// Seconds a finished job stays fetchable. 0 = forever.
    pub job_ttl_secs: u64,
    pub reap_interval_secs: u64,
}

impl JobsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let worker_mode = profiled_env_opt(p, "NETJOBS_WORKER_MODE")
            .and_then(|v| match v.parse() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    tracing::warn!("{}, falling back to process mode", e);
                    None
                }
            })
            .unwrap_or(WorkerMode::Process);
        Self {
            worker_mode,
            worker_binary: profiled_env_opt(p, "NETJOBS_WORKER_BIN").map(PathBuf::from),
            kill_on_terminate: profiled_env_bool(p, "NETJOBS_KILL_ON_TERMINATE", false),
            job_ttl_secs: profiled_env_u64(p, "NETJOBS_JOB_TTL_SECS", 0),
            reap_interval_secs: profiled_env_u64(p, "NETJOBS_REAP_INTERVAL_SECS", 60),
        }
    }

    /// Resolve the worker binary path.
    pub fn resolved_worker_binary(&self) -> PathBuf {
        if let Some(path) = &self.worker_binary {
            return path.clone();
        }
        let name = if cfg!(windows) { "compute-worker.exe" } else { "compute-worker" };
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(name)))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_mode: WorkerMode::Process,
            worker_binary: None,
            kill_on_terminate: false,
            job_ttl_secs: 0,
            reap_interval_secs: 60,
        }
    }
}
