use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use crate::channel::{status_channel, StatusReader, StatusSink};
use crate::error::JobError;
use crate::types::{Job, JobId, JobSummary};

/// Termination signal from the registry to a job's supervisor.
///
/// The permit is stored, so a supervisor that starts waiting after
/// `cancel()` still observes it.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    notify: Arc<Notify>,
    requested: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// One live job plus the read side of its status channel.
#[derive(Debug, Clone)]
pub struct JobEntry {
    pub job: Job,
    pub reader: StatusReader,
    pub cancel: CancelHandle,
}

impl JobEntry {
    pub fn summary(&self) -> JobSummary {
        let record = self.reader.snapshot();
        JobSummary {
            job: self.job.clone(),
            state: record.status.state,
            updated_at: record.status.updated_at,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: IndexMap<JobId, JobEntry>,
    closed: bool,
}

/// The job registry: the only process-wide mutable structure.
///
/// Constructed once at startup and shared by `Arc`. Entries are kept in
/// submission order. A poisoned lock means an earlier request panicked
/// while mutating the map; that is treated as fatal.
#[derive(Debug, Default)]
pub struct JobStore {
    inner: RwLock<Inner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new PENDING job and hand back the writer side of its
    /// channel plus its cancel handle.
    pub fn create(
        &self,
        algorithm: &str,
        owner: &str,
    ) -> Result<(Job, StatusSink, CancelHandle), JobError> {
        let mut inner = self.write();
        if inner.closed {
            return Err(JobError::ShuttingDown);
        }

        // v4 ids are random; a removed id is never drawn again in practice,
        // so only live entries need checking.
        let mut id = Uuid::new_v4();
        while inner.jobs.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let job = Job {
            id,
            algorithm: algorithm.to_string(),
            owner: owner.to_string(),
            created_at: Utc::now(),
        };
        let (sink, reader) = status_channel();
        let cancel = CancelHandle::new();

        inner.jobs.insert(
            id,
            JobEntry {
                job: job.clone(),
                reader,
                cancel: cancel.clone(),
            },
        );
        debug!(job_id = %id, algorithm, "job registered");
        Ok((job, sink, cancel))
    }

    pub fn lookup(&self, id: JobId) -> Result<JobEntry, JobError> {
        self.read().jobs.get(&id).cloned().ok_or(JobError::NotFound(id))
    }

    pub fn remove(&self, id: JobId) -> Result<JobEntry, JobError> {
        self.write()
            .jobs
            .shift_remove(&id)
            .ok_or(JobError::NotFound(id))
    }

    /// Live jobs in submission order.
    pub fn list(&self) -> Vec<JobSummary> {
        self.read().jobs.values().map(JobEntry::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.read().closed
    }

    /// Stop accepting jobs and drop every entry. Returns how many were
    /// dropped.
    pub fn shutdown(&self) -> usize {
        let mut inner = self.write();
        inner.closed = true;
        let dropped = inner.jobs.len();
        for (_, entry) in inner.jobs.drain(..) {
            entry.cancel.cancel();
        }
        info!(dropped, "job store shut down");
        dropped
    }

    /// Remove jobs that have been terminal for longer than `ttl`.
    pub fn reap_expired(&self, ttl: Duration) -> Vec<JobId> {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Vec::new();
        };
        let cutoff = Utc::now() - ttl;

        let mut inner = self.write();
        let mut expired = Vec::new();
        inner.jobs.retain(|id, entry| {
            let record = entry.reader.snapshot();
            let keep = !(record.status.state.is_terminal() && record.status.updated_at <= cutoff);
            if !keep {
                expired.push(*id);
            }
            keep
        });
        expired
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("job store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("job store lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::types::JobState;
    use serde_json::json;

    #[test]
    fn create_then_lookup() {
        let store = JobStore::new();
        let (job, _sink, _cancel) = store.create("leiden", "leiden").unwrap();

        let entry = store.lookup(job.id).unwrap();
        assert_eq!(entry.job, job);
        assert_eq!(entry.reader.state(), JobState::Pending);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn writes_through_sink_are_visible() {
        let store = JobStore::new();
        let (job, sink, _cancel) = store.create("infomap", "infomap").unwrap();
        sink.done(json!({ "community_count": 3 }));

        let record = store.lookup(job.id).unwrap().reader.snapshot();
        assert_eq!(record.status.state, JobState::Done);
    }

    #[test]
    fn removed_ids_stay_gone() {
        let store = JobStore::new();
        let (job, _sink, _cancel) = store.create("leiden", "leiden").unwrap();

        assert!(store.remove(job.id).is_ok());
        assert!(matches!(store.remove(job.id), Err(JobError::NotFound(id)) if id == job.id));
        assert!(matches!(store.lookup(job.id), Err(JobError::NotFound(_))));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = JobStore::new();
        assert!(matches!(store.lookup(Uuid::new_v4()), Err(JobError::NotFound(_))));
    }

    #[test]
    fn remove_signals_nothing_by_itself() {
        let store = JobStore::new();
        let (job, _sink, cancel) = store.create("leiden", "leiden").unwrap();
        store.remove(job.id).unwrap();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn list_keeps_submission_order() {
        let store = JobStore::new();
        let ids: Vec<JobId> = ["a", "b", "c"]
            .iter()
            .map(|name| store.create(name, name).unwrap().0.id)
            .collect();
        store.remove(ids[1]).unwrap();

        let listed: Vec<JobId> = store.list().iter().map(|s| s.job.id).collect();
        assert_eq!(listed, vec![ids[0], ids[2]]);
    }

    #[test]
    fn shutdown_drops_entries_and_refuses_new_jobs() {
        let store = JobStore::new();
        let (job, _sink, cancel) = store.create("leiden", "leiden").unwrap();

        assert_eq!(store.shutdown(), 1);
        assert!(store.is_empty());
        assert!(store.is_shut_down());
        assert!(cancel.is_cancelled());
        assert!(matches!(store.lookup(job.id), Err(JobError::NotFound(_))));
        assert!(matches!(store.create("leiden", "leiden"), Err(JobError::ShuttingDown)));
    }

    #[test]
    fn reap_removes_only_expired_terminal_jobs() {
        let store = JobStore::new();
        let (done, done_sink, _) = store.create("leiden", "leiden").unwrap();
        let (running, running_sink, _) = store.create("leiden", "leiden").unwrap();
        let (pending, _pending_sink, _) = store.create("leiden", "leiden").unwrap();
        done_sink.done(json!({}));
        running_sink.running(None);

        assert!(store.reap_expired(Duration::from_secs(3600)).is_empty());
        assert_eq!(store.reap_expired(Duration::ZERO), vec![done.id]);
        assert!(store.lookup(running.id).is_ok());
        assert!(store.lookup(pending.id).is_ok());
    }

    #[test]
    fn concurrent_creates_yield_distinct_ids() {
        let store = Arc::new(JobStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.create("leiden", "leiden").unwrap().0.id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 400);
        assert_eq!(store.len(), 400);
    }

    #[test]
    fn removed_and_reaped_jobs_leave_nothing_behind() {
        let store = JobStore::new();
        for i in 0..2_000 {
            let (job, sink, _) = store.create("leiden", "leiden").unwrap();
            sink.done(json!({}));
            if i % 2 == 0 {
                store.remove(job.id).unwrap();
            }
        }
        assert_eq!(store.len(), 1_000);
        assert_eq!(store.reap_expired(Duration::ZERO).len(), 1_000);

        let inner = store.read();
        assert!(inner.jobs.is_empty());
    }

    #[tokio::test]
    async fn cancel_before_wait_is_not_lost() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .unwrap();
    }
}
