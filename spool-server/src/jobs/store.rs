//! Job store interface
//!
//! Every mutating operation is a compare-and-swap on the job status inside
//! one critical section (memory) or one write transaction (redb). Callers
//! never read-modify-write across an await.

use async_trait::async_trait;
use serde::Serialize;
use shared::error::AppError;
use shared::models::{
    ContentType, JobEvent, JobLogEntry, JobStats, JobStatus, JobType, PrintJob,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Print job not found: {0}")]
    JobNotFound(String),
}

pub type JobStoreResult<T> = Result<T, JobStoreError>;

impl From<JobStoreError> for AppError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::JobNotFound(id) => AppError::job_not_found(id),
            other => AppError::database(other.to_string()),
        }
    }
}

/// Everything needed to create a job; the store assigns id, sequence and status
#[derive(Debug, Clone)]
pub struct NewJob {
    pub idempotency_key: String,
    pub printer_id: String,
    pub job_type: JobType,
    pub content_type: ContentType,
    pub payload: Vec<u8>,
    pub priority: i32,
    pub max_retries: u32,
    pub order_id: Option<String>,
    pub table_id: Option<String>,
    pub reprint_of: Option<String>,
}

impl NewJob {
    pub fn new(
        idempotency_key: impl Into<String>,
        printer_id: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            printer_id: printer_id.into(),
            job_type: JobType::default(),
            content_type: ContentType::default(),
            payload,
            priority: 0,
            max_retries: 3,
            order_id: None,
            table_id: None,
            reprint_of: None,
        }
    }

    /// Materialize as a freshly queued job
    pub fn into_job(self, sequence: u64, now: i64) -> PrintJob {
        PrintJob {
            id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: self.idempotency_key,
            printer_id: self.printer_id,
            job_type: self.job_type,
            content_type: self.content_type,
            payload: self.payload,
            status: JobStatus::Queued,
            priority: self.priority,
            retry_count: 0,
            max_retries: self.max_retries,
            next_retry_at: None,
            sequence,
            created_at: now,
            delivered_at: None,
            printed_at: None,
            failed_at: None,
            cancelled_at: None,
            last_error: None,
            order_id: self.order_id,
            table_id: self.table_id,
            reprint_of: self.reprint_of,
        }
    }
}

/// Result of [`JobStore::create`]
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub job: PrintJob,
    /// False when the idempotency key already existed
    pub created: bool,
}

/// Result of [`JobStore::transition`]
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    /// The job after the attempt (unchanged when not applied)
    pub job: PrintJob,
    pub applied: bool,
}

/// Filter for [`JobStore::list`], newest first
#[derive(Debug, Clone)]
pub struct JobQuery {
    pub printer_id: Option<String>,
    pub status: Option<JobStatus>,
    pub offset: usize,
    pub limit: usize,
}

pub const DEFAULT_PAGE_LIMIT: usize = 50;

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            printer_id: None,
            status: None,
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl JobQuery {
    pub fn matches(&self, job: &PrintJob) -> bool {
        self.printer_id.as_deref().is_none_or(|p| p == job.printer_id)
            && self.status.is_none_or(|s| s == job.status)
    }

    /// Apply ordering and pagination to matching jobs
    pub fn page(&self, mut jobs: Vec<PrintJob>) -> Vec<PrintJob> {
        jobs.sort_by_key(|j| std::cmp::Reverse(j.sequence));
        jobs.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Persistence for print jobs and their audit logs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job unless its idempotency key is already known
    async fn create(&self, job: NewJob, now: i64) -> JobStoreResult<CreateOutcome>;

    async fn get(&self, id: &str) -> JobStoreResult<Option<PrintJob>>;

    async fn find_by_key(&self, idempotency_key: &str) -> JobStoreResult<Option<PrintJob>>;

    async fn list(&self, query: &JobQuery) -> JobStoreResult<Vec<PrintJob>>;

    /// Job `claim_next` would hand out, without claiming it
    async fn peek_next(&self, printer_id: &str, now: i64) -> JobStoreResult<Option<PrintJob>>;

    /// Atomically move the next eligible job of `printer_id` to DELIVERED
    async fn claim_next(&self, printer_id: &str, now: i64) -> JobStoreResult<Option<PrintJob>>;

    /// Apply `event` if the current status allows it
    ///
    /// Both outcomes are written to the job log.
    async fn transition(&self, id: &str, event: JobEvent, now: i64)
    -> JobStoreResult<TransitionOutcome>;

    async fn append_log(&self, entry: JobLogEntry) -> JobStoreResult<()>;

    /// Log entries of a job, oldest first
    async fn logs(&self, job_id: &str) -> JobStoreResult<Vec<JobLogEntry>>;

    /// DELIVERED jobs handed out at or before `cutoff`
    async fn stale_deliveries(&self, cutoff: i64) -> JobStoreResult<Vec<PrintJob>>;

    /// FAILED jobs that may still be requeued
    async fn retryable_failures(&self) -> JobStoreResult<Vec<PrintJob>>;

    /// FAILED jobs with no retries left
    async fn terminal_failures(&self) -> JobStoreResult<Vec<PrintJob>>;

    async fn stats(&self) -> JobStoreResult<JobStats>;

    // ========== Transition shortcuts ==========

    async fn mark_printed(&self, id: &str, now: i64) -> JobStoreResult<TransitionOutcome> {
        self.transition(id, JobEvent::ConfirmPrinted, now).await
    }

    async fn mark_failed(&self, id: &str, error: &str, now: i64) -> JobStoreResult<TransitionOutcome> {
        self.transition(
            id,
            JobEvent::ReportFailure {
                error: error.to_string(),
            },
            now,
        )
        .await
    }

    async fn requeue(
        &self,
        id: &str,
        retry_at: Option<i64>,
        now: i64,
    ) -> JobStoreResult<TransitionOutcome> {
        self.transition(id, JobEvent::Requeue { retry_at }, now).await
    }

    async fn cancel(&self, id: &str, now: i64) -> JobStoreResult<TransitionOutcome> {
        self.transition(id, JobEvent::Cancel, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_matches_and_pages_newest_first() {
        let jobs: Vec<PrintJob> = (1..=5)
            .map(|seq| {
                let mut job = NewJob::new(format!("k{}", seq), "kitchen", vec![seq as u8])
                    .into_job(seq, 0);
                if seq % 2 == 0 {
                    job.printer_id = "bar".into();
                }
                job
            })
            .collect();

        let query = JobQuery {
            printer_id: Some("kitchen".into()),
            limit: 2,
            ..JobQuery::default()
        };
        let matching: Vec<PrintJob> = jobs.into_iter().filter(|j| query.matches(j)).collect();
        let page = query.page(matching);
        let seqs: Vec<u64> = page.iter().map(|j| j.sequence).collect();
        assert_eq!(seqs, vec![5, 3]);
    }

    #[test]
    fn test_store_error_maps_to_app_error() {
        let err: AppError = JobStoreError::JobNotFound("abc".into()).into();
        assert_eq!(err.code, shared::ErrorCode::JobNotFound);
    }
}
