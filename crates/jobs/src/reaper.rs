use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::JobStore;

/// Periodically drop jobs that have been terminal for longer than `ttl`.
/// The task ends once the store is shut down.
pub fn spawn_reaper(store: Arc<JobStore>, ttl: Duration, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(10));
    tokio::spawn(async move {
        info!(ttl_secs = ttl.as_secs(), interval_ms = interval.as_millis() as u64, "job reaper started");
        loop {
            tokio::time::sleep(interval).await;
            if store.is_shut_down() {
                debug!("job reaper stopping");
                break;
            }
            let reaped = store.reap_expired(ttl);
            if !reaped.is_empty() {
                info!(count = reaped.len(), "reaped expired jobs");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reaps_finished_jobs_and_stops_on_shutdown() {
        let store = Arc::new(JobStore::new());
        let (done, sink, _) = store.create("leiden", "leiden").unwrap();
        let (running, running_sink, _) = store.create("leiden", "leiden").unwrap();
        sink.done(json!({}));
        running_sink.running(None);

        let handle = spawn_reaper(store.clone(), Duration::ZERO, Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.lookup(done.id).is_ok() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(store.lookup(running.id).is_ok());

        store.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
