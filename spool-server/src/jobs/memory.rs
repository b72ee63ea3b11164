//! In-memory job store
//!
//! All maps live behind one `parking_lot::Mutex`; each operation is a single
//! critical section, which makes `claim_next` and `transition` atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{JobEvent, JobLogEntry, JobStats, JobStatus, PrintJob};

use super::state::{applied_log, apply_event, rejected_log, select_next};
use super::store::{
    CreateOutcome, JobQuery, JobStore, JobStoreError, JobStoreResult, NewJob, TransitionOutcome,
};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, PrintJob>,
    /// idempotency key -> job id
    by_key: HashMap<String, String>,
    logs: HashMap<String, Vec<JobLogEntry>>,
    next_sequence: u64,
}

impl Inner {
    fn push_log(&mut self, entry: JobLogEntry) {
        self.logs.entry(entry.job_id.clone()).or_default().push(entry);
    }

    fn collect(&self, filter: impl Fn(&PrintJob) -> bool) -> Vec<PrintJob> {
        let mut jobs: Vec<PrintJob> = self.jobs.values().filter(|j| filter(j)).cloned().collect();
        jobs.sort_by_key(|j| j.sequence);
        jobs
    }
}

/// Volatile job store, lost on restart
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob, now: i64) -> JobStoreResult<CreateOutcome> {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner
            .by_key
            .get(&job.idempotency_key)
            .and_then(|id| inner.jobs.get(id))
        {
            return Ok(CreateOutcome {
                job: existing.clone(),
                created: false,
            });
        }

        inner.next_sequence += 1;
        let job = job.into_job(inner.next_sequence, now);

        inner
            .by_key
            .insert(job.idempotency_key.clone(), job.id.clone());
        inner.push_log(JobLogEntry::info(
            &job.id,
            format!("enqueued for printer {}", job.printer_id),
            now,
        ));
        inner.jobs.insert(job.id.clone(), job.clone());

        Ok(CreateOutcome { job, created: true })
    }

    async fn get(&self, id: &str) -> JobStoreResult<Option<PrintJob>> {
        Ok(self.inner.lock().jobs.get(id).cloned())
    }

    async fn find_by_key(&self, idempotency_key: &str) -> JobStoreResult<Option<PrintJob>> {
        let inner = self.inner.lock();
        Ok(inner
            .by_key
            .get(idempotency_key)
            .and_then(|id| inner.jobs.get(id))
            .cloned())
    }

    async fn list(&self, query: &JobQuery) -> JobStoreResult<Vec<PrintJob>> {
        let matching = self.inner.lock().collect(|j| query.matches(j));
        Ok(query.page(matching))
    }

    async fn peek_next(&self, printer_id: &str, now: i64) -> JobStoreResult<Option<PrintJob>> {
        let inner = self.inner.lock();
        Ok(select_next(inner.jobs.values(), printer_id, now).cloned())
    }

    async fn claim_next(&self, printer_id: &str, now: i64) -> JobStoreResult<Option<PrintJob>> {
        let mut inner = self.inner.lock();

        let Some(id) = select_next(inner.jobs.values(), printer_id, now).map(|j| j.id.clone())
        else {
            return Ok(None);
        };

        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if apply_event(job, &JobEvent::Claim, now).is_err() {
            // select_next only yields QUEUED jobs
            return Ok(None);
        }
        let claimed = job.clone();
        inner.push_log(applied_log(&claimed, &JobEvent::Claim, now));

        Ok(Some(claimed))
    }

    async fn transition(
        &self,
        id: &str,
        event: JobEvent,
        now: i64,
    ) -> JobStoreResult<TransitionOutcome> {
        let mut inner = self.inner.lock();

        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::JobNotFound(id.to_string()))?;

        let (job, applied, entry) = match apply_event(job, &event, now) {
            Ok(()) => {
                let entry = applied_log(job, &event, now);
                (job.clone(), true, entry)
            }
            Err(err) => {
                let entry = rejected_log(job, &err, now);
                (job.clone(), false, entry)
            }
        };
        inner.push_log(entry);

        Ok(TransitionOutcome { job, applied })
    }

    async fn append_log(&self, entry: JobLogEntry) -> JobStoreResult<()> {
        let mut inner = self.inner.lock();
        if !inner.jobs.contains_key(&entry.job_id) {
            return Err(JobStoreError::JobNotFound(entry.job_id));
        }
        inner.push_log(entry);
        Ok(())
    }

    async fn logs(&self, job_id: &str) -> JobStoreResult<Vec<JobLogEntry>> {
        Ok(self
            .inner
            .lock()
            .logs
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn stale_deliveries(&self, cutoff: i64) -> JobStoreResult<Vec<PrintJob>> {
        Ok(self.inner.lock().collect(|j| {
            j.status == JobStatus::Delivered && j.delivered_at.is_some_and(|at| at <= cutoff)
        }))
    }

    async fn retryable_failures(&self) -> JobStoreResult<Vec<PrintJob>> {
        Ok(self
            .inner
            .lock()
            .collect(|j| j.status == JobStatus::Failed && j.has_retry_budget()))
    }

    async fn terminal_failures(&self) -> JobStoreResult<Vec<PrintJob>> {
        Ok(self
            .inner
            .lock()
            .collect(|j| j.status == JobStatus::Failed && !j.has_retry_budget()))
    }

    async fn stats(&self) -> JobStoreResult<JobStats> {
        let inner = self.inner.lock();
        let mut stats = JobStats::default();
        for job in inner.jobs.values() {
            stats.record(job.status);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::LogLevel;
    use std::sync::Arc;

    fn new_job(key: &str) -> NewJob {
        NewJob::new(key, "kitchen", b"hello".to_vec())
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = MemoryJobStore::new();
        let first = store.create(new_job("order-1"), 10).await.unwrap();
        assert!(first.created);

        let mut other = new_job("order-1");
        other.payload = b"different".to_vec();
        let second = store.create(other, 20).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.job.id, first.job.id);
        assert_eq!(second.job.payload, b"hello");
        assert_eq!(store.stats().await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_fifo_and_single_delivery() {
        let store = MemoryJobStore::new();
        let a = store.create(new_job("a"), 10).await.unwrap().job;
        let b = store.create(new_job("b"), 11).await.unwrap().job;

        let first = store.claim_next("kitchen", 20).await.unwrap().unwrap();
        assert_eq!(first.id, a.id);
        assert_eq!(first.status, JobStatus::Delivered);

        let second = store.claim_next("kitchen", 21).await.unwrap().unwrap();
        assert_eq!(second.id, b.id);

        assert!(store.claim_next("kitchen", 22).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_hand_out_each_job_once() {
        let store = Arc::new(MemoryJobStore::new());
        for i in 0..5 {
            store.create(new_job(&format!("job-{}", i)), i).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_next("kitchen", 100).await.unwrap()
            }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(job) = handle.await.unwrap() {
                claimed.push(job.id);
            }
        }
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 5);
    }

    #[tokio::test]
    async fn test_peek_does_not_claim() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job("a"), 10).await.unwrap().job;

        let peeked = store.peek_next("kitchen", 20).await.unwrap().unwrap();
        assert_eq!(peeked.id, job.id);
        assert_eq!(peeked.status, JobStatus::Queued);
        assert!(store.claim_next("kitchen", 20).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_transition_logs_warning() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job("a"), 10).await.unwrap().job;

        let outcome = store.mark_printed(&job.id, 20).await.unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.job.status, JobStatus::Queued);

        let logs = store.logs(&job.id).await.unwrap();
        assert_eq!(logs.last().unwrap().level, LogLevel::Warning);
    }

    #[tokio::test]
    async fn test_transition_unknown_job() {
        let store = MemoryJobStore::new();
        let err = store.cancel("missing", 10).await.unwrap_err();
        assert!(matches!(err, JobStoreError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_failure_queries() {
        let store = MemoryJobStore::new();
        let mut spent = new_job("spent");
        spent.max_retries = 0;
        let spent = store.create(spent, 10).await.unwrap().job;
        let fresh = store.create(new_job("fresh"), 11).await.unwrap().job;

        for id in [&spent.id, &fresh.id] {
            store.claim_next("kitchen", 20).await.unwrap();
            store.mark_failed(id, "offline", 30).await.unwrap();
        }

        let retryable = store.retryable_failures().await.unwrap();
        assert_eq!(retryable.len(), 1);
        assert_eq!(retryable[0].id, fresh.id);

        let terminal = store.terminal_failures().await.unwrap();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].id, spent.id);
    }

    #[tokio::test]
    async fn test_stale_deliveries_cutoff() {
        let store = MemoryJobStore::new();
        store.create(new_job("a"), 10).await.unwrap();
        store.claim_next("kitchen", 100).await.unwrap();

        assert!(store.stale_deliveries(99).await.unwrap().is_empty());
        assert_eq!(store.stale_deliveries(100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = MemoryJobStore::new();
        store.create(new_job("a"), 10).await.unwrap();
        store.create(new_job("b"), 11).await.unwrap();
        store.claim_next("kitchen", 20).await.unwrap();

        let query = JobQuery {
            status: Some(JobStatus::Queued),
            ..JobQuery::default()
        };
        let queued = store.list(&query).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].idempotency_key, "b");
    }
}
