use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use netjobs_client::{parse_edge_list, JobClient};
use tracing::info;

/// Submit a CSV edge list to a netjobs server, wait for the job and print
/// the result.
#[derive(Parser, Debug)]
#[command(name = "netjobs-cli", version, about)]
struct Cli {
    /// Edge list file, one `source,target[,weight]` per line.
    #[arg(short, long)]
    input: PathBuf,

    /// Server base URL.
    #[arg(short, long, env = "NETJOBS_SERVER", default_value = "http://localhost:8000/")]
    server: String,

    /// Algorithm service to run.
    #[arg(short = 'a', long, default_value = "leiden")]
    service: String,

    /// Algorithm option as `name=value`; repeatable.
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,

    /// Seconds between status polls.
    #[arg(long, default_value_t = 2)]
    poll_secs: u64,

    /// Give up after this many seconds (0 = wait forever).
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,
}

fn split_options(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|opt| match opt.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => bail!("option '{opt}' must look like name=value"),
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = split_options(&cli.options)?;
    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let graph = parse_edge_list(&text)?;

    let client = JobClient::new(&cli.server).with_poll_interval(Duration::from_secs(cli.poll_secs));
    let timeout = (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs));

    let job_id = client.submit(&cli.service, &graph, &options).await?;
    info!(job_id = %job_id, service = %cli.service, "job submitted");

    let status = client.wait_for_completion(&job_id, timeout).await?;
    info!(job_id = %job_id, status = %status, "job finished");

    let result = client.fetch(&job_id).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_split_on_first_equals() {
        let parsed = split_options(&["resolution=0.5".into(), "objective_function = cpm".into()]).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("resolution".to_string(), "0.5".to_string()),
                ("objective_function".to_string(), "cpm".to_string()),
            ]
        );
        assert!(split_options(&["resolution".into()]).is_err());
        assert!(split_options(&["=1".into()]).is_err());
    }
}
