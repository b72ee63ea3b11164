//! redb-based job storage
//!
//! Every mutation runs in a single write transaction. redb serializes write
//! transactions, so `claim_next` can never hand the same job to two pollers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{JobEvent, JobLogEntry, JobStats, JobStatus, PrintJob};

use super::state::{applied_log, apply_event, rejected_log, select_next};
use super::store::{
    CreateOutcome, JobQuery, JobStore, JobStoreError, JobStoreResult, NewJob, TransitionOutcome,
};

/// Jobs table: key = job_id, value = JSON
const JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_jobs");

/// Index: idempotency_key -> job_id
const JOBS_BY_KEY_TABLE: TableDefinition<&str, &str> = TableDefinition::new("print_jobs_by_key");

/// Index of QUEUED jobs: (printer_id, sequence) -> job_id
const QUEUE_TABLE: TableDefinition<(&str, u64), &str> = TableDefinition::new("print_queue");

/// Job logs: (job_id, log_seq) -> JSON
const JOB_LOGS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("job_logs");

/// Counters
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const JOB_SEQ: &str = "job_seq";
const LOG_SEQ: &str = "log_seq";

/// Persistent job store backed by redb
#[derive(Clone)]
pub struct RedbJobStore {
    db: Arc<Database>,
}

impl RedbJobStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> JobStoreResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> JobStoreResult<Self> {
        Self::init(Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?)
    }

    fn init(db: Database) -> JobStoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOBS_TABLE)?;
            let _ = write_txn.open_table(JOBS_BY_KEY_TABLE)?;
            let _ = write_txn.open_table(QUEUE_TABLE)?;
            let _ = write_txn.open_table(JOB_LOGS_TABLE)?;
            let _ = write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Number of stored jobs
    pub fn job_count(&self) -> JobStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;
        Ok(table.len()?)
    }

    /// All jobs matching `filter`, oldest first
    fn scan(&self, filter: impl Fn(&PrintJob) -> bool) -> JobStoreResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            let job: PrintJob = serde_json::from_slice(guard.value())?;
            if filter(&job) {
                jobs.push(job);
            }
        }

        jobs.sort_by_key(|j| j.sequence);
        Ok(jobs)
    }
}

// ========== Table helpers ==========

fn read_job<T>(table: &T, id: &str) -> JobStoreResult<Option<PrintJob>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

/// QUEUED jobs of one printer, in sequence order
fn read_queue<Q, J>(queue: &Q, jobs: &J, printer_id: &str) -> JobStoreResult<Vec<PrintJob>>
where
    Q: ReadableTable<(&'static str, u64), &'static str>,
    J: ReadableTable<&'static str, &'static [u8]>,
{
    let range_start: (&str, u64) = (printer_id, 0);
    let range_end: (&str, u64) = (printer_id, u64::MAX);

    let mut queued = Vec::new();
    for result in queue.range(range_start..=range_end)? {
        let (_, guard) = result?;
        if let Some(job) = read_job(jobs, guard.value())? {
            queued.push(job);
        }
    }
    Ok(queued)
}

fn next_counter(txn: &WriteTransaction, name: &str) -> JobStoreResult<u64> {
    let mut table = txn.open_table(META_TABLE)?;
    let next = table.get(name)?.map(|g| g.value()).unwrap_or(0) + 1;
    table.insert(name, next)?;
    Ok(next)
}

/// Write the job and keep the queue index in sync with its status
fn save_job(txn: &WriteTransaction, job: &PrintJob) -> JobStoreResult<()> {
    {
        let mut table = txn.open_table(JOBS_TABLE)?;
        let value = serde_json::to_vec(job)?;
        table.insert(job.id.as_str(), value.as_slice())?;
    }

    let mut queue = txn.open_table(QUEUE_TABLE)?;
    let key = (job.printer_id.as_str(), job.sequence);
    if job.status == JobStatus::Queued {
        queue.insert(key, job.id.as_str())?;
    } else {
        queue.remove(key)?;
    }
    Ok(())
}

fn push_log(txn: &WriteTransaction, entry: &JobLogEntry) -> JobStoreResult<()> {
    let seq = next_counter(txn, LOG_SEQ)?;
    let mut table = txn.open_table(JOB_LOGS_TABLE)?;
    let value = serde_json::to_vec(entry)?;
    table.insert((entry.job_id.as_str(), seq), value.as_slice())?;
    Ok(())
}

#[async_trait]
impl JobStore for RedbJobStore {
    async fn create(&self, job: NewJob, now: i64) -> JobStoreResult<CreateOutcome> {
        let txn = self.db.begin_write()?;

        let existing = {
            let by_key = txn.open_table(JOBS_BY_KEY_TABLE)?;
            let jobs = txn.open_table(JOBS_TABLE)?;
            let id = by_key
                .get(job.idempotency_key.as_str())?
                .map(|g| g.value().to_string());
            match id {
                Some(id) => read_job(&jobs, &id)?,
                None => None,
            }
        };
        if let Some(existing) = existing {
            txn.abort()?;
            return Ok(CreateOutcome {
                job: existing,
                created: false,
            });
        }

        let sequence = next_counter(&txn, JOB_SEQ)?;
        let job = job.into_job(sequence, now);
        save_job(&txn, &job)?;
        {
            let mut by_key = txn.open_table(JOBS_BY_KEY_TABLE)?;
            by_key.insert(job.idempotency_key.as_str(), job.id.as_str())?;
        }
        push_log(
            &txn,
            &JobLogEntry::info(&job.id, format!("enqueued for printer {}", job.printer_id), now),
        )?;
        txn.commit()?;

        Ok(CreateOutcome { job, created: true })
    }

    async fn get(&self, id: &str) -> JobStoreResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;
        read_job(&table, id)
    }

    async fn find_by_key(&self, idempotency_key: &str) -> JobStoreResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let by_key = read_txn.open_table(JOBS_BY_KEY_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        let id = by_key.get(idempotency_key)?.map(|g| g.value().to_string());
        match id {
            Some(id) => read_job(&jobs, &id),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &JobQuery) -> JobStoreResult<Vec<PrintJob>> {
        let matching = self.scan(|j| query.matches(j))?;
        Ok(query.page(matching))
    }

    async fn peek_next(&self, printer_id: &str, now: i64) -> JobStoreResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let queue = read_txn.open_table(QUEUE_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        let queued = read_queue(&queue, &jobs, printer_id)?;
        Ok(select_next(&queued, printer_id, now).cloned())
    }

    async fn claim_next(&self, printer_id: &str, now: i64) -> JobStoreResult<Option<PrintJob>> {
        let txn = self.db.begin_write()?;

        let queued = {
            let queue = txn.open_table(QUEUE_TABLE)?;
            let jobs = txn.open_table(JOBS_TABLE)?;
            read_queue(&queue, &jobs, printer_id)?
        };
        let Some(mut job) = select_next(&queued, printer_id, now).cloned() else {
            txn.abort()?;
            return Ok(None);
        };

        if let Err(err) = apply_event(&mut job, &JobEvent::Claim, now) {
            // Queue index out of sync with the job record; leave it for the next sweep
            push_log(&txn, &rejected_log(&job, &err, now))?;
            txn.commit()?;
            return Ok(None);
        }
        save_job(&txn, &job)?;
        push_log(&txn, &applied_log(&job, &JobEvent::Claim, now))?;
        txn.commit()?;

        Ok(Some(job))
    }

    async fn transition(
        &self,
        id: &str,
        event: JobEvent,
        now: i64,
    ) -> JobStoreResult<TransitionOutcome> {
        let txn = self.db.begin_write()?;

        let mut job = {
            let jobs = txn.open_table(JOBS_TABLE)?;
            read_job(&jobs, id)?
        }
        .ok_or_else(|| JobStoreError::JobNotFound(id.to_string()))?;

        let (applied, entry) = match apply_event(&mut job, &event, now) {
            Ok(()) => {
                save_job(&txn, &job)?;
                (true, applied_log(&job, &event, now))
            }
            Err(err) => (false, rejected_log(&job, &err, now)),
        };
        push_log(&txn, &entry)?;
        txn.commit()?;

        Ok(TransitionOutcome { job, applied })
    }

    async fn append_log(&self, entry: JobLogEntry) -> JobStoreResult<()> {
        let txn = self.db.begin_write()?;

        let exists = {
            let jobs = txn.open_table(JOBS_TABLE)?;
            jobs.get(entry.job_id.as_str())?.is_some()
        };
        if !exists {
            txn.abort()?;
            return Err(JobStoreError::JobNotFound(entry.job_id));
        }

        push_log(&txn, &entry)?;
        txn.commit()?;
        Ok(())
    }

    async fn logs(&self, job_id: &str) -> JobStoreResult<Vec<JobLogEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOB_LOGS_TABLE)?;

        let range_start: (&str, u64) = (job_id, 0);
        let range_end: (&str, u64) = (job_id, u64::MAX);

        let mut entries = Vec::new();
        for result in table.range(range_start..=range_end)? {
            let (_, guard) = result?;
            entries.push(serde_json::from_slice(guard.value())?);
        }
        Ok(entries)
    }

    async fn stale_deliveries(&self, cutoff: i64) -> JobStoreResult<Vec<PrintJob>> {
        self.scan(|j| {
            j.status == JobStatus::Delivered && j.delivered_at.is_some_and(|at| at <= cutoff)
        })
    }

    async fn retryable_failures(&self) -> JobStoreResult<Vec<PrintJob>> {
        self.scan(|j| j.status == JobStatus::Failed && j.has_retry_budget())
    }

    async fn terminal_failures(&self) -> JobStoreResult<Vec<PrintJob>> {
        self.scan(|j| j.status == JobStatus::Failed && !j.has_retry_budget())
    }

    async fn stats(&self) -> JobStoreResult<JobStats> {
        let mut stats = JobStats::default();
        for job in self.scan(|_| true)? {
            stats.record(job.status);
        }
        Ok(stats)
    }
}
