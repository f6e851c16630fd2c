use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;

/// Job state as reported by `GET /status/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl FromStr for JobStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(ClientError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct ServicesResponse {
    algorithms: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the netjobs REST API.
#[derive(Debug, Clone)]
pub struct JobClient {
    base_url: String,
    http: reqwest::Client,
    poll_interval: Duration,
}

impl JobClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Upload a graph payload to `algorithm` and return the job id.
    pub async fn submit(
        &self,
        algorithm: &str,
        graph: &Value,
        options: &[(String, String)],
    ) -> Result<String, ClientError> {
        let part = Part::text(graph.to_string())
            .file_name("graph.json")
            .mime_str("application/json")?;
        let resp = self
            .http
            .post(self.url(&format!("service/{algorithm}")))
            .query(options)
            .multipart(Form::new().part("data", part))
            .send()
            .await?;
        let body: SubmitResponse = ok(resp).await?.json().await?;
        debug!(job_id = %body.job_id, algorithm, "submitted");
        Ok(body.job_id)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus, ClientError> {
        let resp = self.http.get(self.url(&format!("status/{job_id}"))).send().await?;
        ok(resp).await?.text().await?.parse()
    }

    /// Status fields merged with the result, if there is one yet.
    pub async fn fetch(&self, job_id: &str) -> Result<Value, ClientError> {
        let resp = self.http.get(self.url(&format!("fetch/{job_id}"))).send().await?;
        Ok(ok(resp).await?.json().await?)
    }

    pub async fn terminate(&self, job_id: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .get(self.url(&format!("terminate/{job_id}")))
            .send()
            .await?;
        ok(resp).await?;
        Ok(())
    }

    pub async fn services(&self) -> Result<Vec<String>, ClientError> {
        let resp = self.http.get(self.url("services")).send().await?;
        let body: ServicesResponse = ok(resp).await?.json().await?;
        Ok(body.algorithms)
    }

    /// Poll until the job is terminal or `timeout` elapses.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        timeout: Option<Duration>,
    ) -> Result<JobStatus, ClientError> {
        let start = Instant::now();
        loop {
            let status = self.status(job_id).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    return Err(ClientError::Timeout {
                        job_id: job_id.to_string(),
                        waited: start.elapsed(),
                    });
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Submit, wait and fetch. A job that ends in ERROR becomes
    /// [`ClientError::JobFailed`].
    pub async fn run(
        &self,
        algorithm: &str,
        graph: &Value,
        options: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Value, ClientError> {
        let job_id = self.submit(algorithm, graph, options).await?;
        let status = self.wait_for_completion(&job_id, timeout).await?;
        let fetched = self.fetch(&job_id).await?;
        if status == JobStatus::Error {
            let message = fetched["message"].as_str().unwrap_or("unknown error").to_string();
            return Err(ClientError::JobFailed { job_id, message });
        }
        Ok(fetched)
    }
}

async fn ok(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_parses() {
        assert_eq!("done".parse::<JobStatus>().unwrap(), JobStatus::Done);
        assert_eq!("running\n".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!(matches!(
            "cancelled".parse::<JobStatus>(),
            Err(ClientError::UnknownStatus(s)) if s == "cancelled"
        ));
    }

    #[test]
    fn base_url_is_normalised() {
        let client = JobClient::new("http://localhost:8000/");
        assert_eq!(client.url("status/x"), "http://localhost:8000/status/x");
    }
}
