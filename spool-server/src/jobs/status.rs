//! Status reporter - printer presence and job outcomes

use std::sync::Arc;

use shared::models::{PollRequest, PrinterPresence};
use thiserror::Error;

use super::clock::Clock;
use super::registry::PresenceBoard;
use super::store::{JobStore, JobStoreError, TransitionOutcome};

/// What a printer says happened to a delivered job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Printed,
    Failed { error: String },
}

impl JobOutcome {
    /// CloudPRNT result code: anything starting with `2` is a success
    pub fn from_status_code(code: &str) -> Self {
        let code = code.trim();
        if code.starts_with('2') {
            JobOutcome::Printed
        } else {
            JobOutcome::Failed {
                error: format!("printer reported status {}", code),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Print job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} belongs to printer {owner}, not {printer_id}")]
    PrinterMismatch {
        job_id: String,
        printer_id: String,
        owner: String,
    },

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Records what printers report back
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn JobStore>,
    presence: Arc<PresenceBoard>,
    clock: Arc<dyn Clock>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn JobStore>, presence: Arc<PresenceBoard>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            presence,
            clock,
        }
    }

    pub fn presence(&self) -> &Arc<PresenceBoard> {
        &self.presence
    }

    /// Update presence from a status report and apply any job outcome it carries
    pub async fn record_poll(
        &self,
        printer_id: &str,
        poll: &PollRequest,
    ) -> Result<Option<TransitionOutcome>, ReportError> {
        self.presence.update(
            printer_id,
            PrinterPresence {
                last_seen_at: self.clock.now_millis(),
                last_status: poll.status.clone(),
                printing_in_progress: poll.printing_in_progress,
                printer_mac: poll.printer_mac.clone(),
            },
        );

        match poll.job_result() {
            Some((token, code)) => {
                let outcome = JobOutcome::from_status_code(code);
                self.record_outcome(token, printer_id, outcome).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Apply a printed / failed report for `job_id` sent by `printer_id`
    pub async fn record_outcome(
        &self,
        job_id: &str,
        printer_id: &str,
        outcome: JobOutcome,
    ) -> Result<TransitionOutcome, ReportError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| ReportError::JobNotFound(job_id.to_string()))?;

        if job.printer_id != printer_id {
            tracing::warn!(
                job_id = %job_id,
                printer_id = %printer_id,
                owner = %job.printer_id,
                "Ignoring job report from a different printer"
            );
            return Err(ReportError::PrinterMismatch {
                job_id: job_id.to_string(),
                printer_id: printer_id.to_string(),
                owner: job.printer_id,
            });
        }

        let now = self.clock.now_millis();
        let result = match &outcome {
            JobOutcome::Printed => self.store.mark_printed(job_id, now).await?,
            JobOutcome::Failed { error } => self.store.mark_failed(job_id, error, now).await?,
        };

        if result.applied {
            match outcome {
                JobOutcome::Printed => {
                    tracing::info!(job_id = %job_id, printer_id = %printer_id, "Job printed")
                }
                JobOutcome::Failed { error } => {
                    tracing::warn!(job_id = %job_id, printer_id = %printer_id, error = %error, "Job failed on printer")
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::clock::ManualClock;
    use crate::jobs::memory::MemoryJobStore;
    use crate::jobs::store::NewJob;
    use shared::models::{JobStatus, LogLevel};

    async fn setup() -> (StatusReporter, Arc<MemoryJobStore>, String) {
        let store = Arc::new(MemoryJobStore::new());
        let job = store
            .create(NewJob::new("k", "kitchen", b"x".to_vec()), 100)
            .await
            .unwrap()
            .job;
        store.claim_next("kitchen", 200).await.unwrap();
        let reporter = StatusReporter::new(
            store.clone(),
            Arc::new(PresenceBoard::new()),
            Arc::new(ManualClock::new(300)),
        );
        (reporter, store, job.id)
    }

    #[test]
    fn test_outcome_from_status_code() {
        assert_eq!(JobOutcome::from_status_code("200"), JobOutcome::Printed);
        assert_eq!(JobOutcome::from_status_code("211 OK"), JobOutcome::Printed);
        assert_eq!(
            JobOutcome::from_status_code("520"),
            JobOutcome::Failed {
                error: "printer reported status 520".into()
            }
        );
    }

    #[tokio::test]
    async fn test_poll_updates_presence_and_applies_outcome() {
        let (reporter, store, id) = setup().await;
        let poll = PollRequest {
            status: Some("23 6 0 0 0 0 0 0 0".into()),
            printer_mac: Some("00:11:62:00:00:01".into()),
            job_token: Some(id.clone()),
            job_status_code: Some("200".into()),
            ..PollRequest::default()
        };

        let outcome = reporter.record_poll("kitchen", &poll).await.unwrap().unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.job.status, JobStatus::Printed);
        assert_eq!(outcome.job.printed_at, Some(300));

        let presence = reporter.presence().get("kitchen").unwrap();
        assert_eq!(presence.last_seen_at, 300);
        assert_eq!(presence.printer_mac.as_deref(), Some("00:11:62:00:00:01"));

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Printed);
    }

    #[tokio::test]
    async fn test_plain_poll_has_no_outcome() {
        let (reporter, _, _) = setup().await;
        let result = reporter.record_poll("kitchen", &PollRequest::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_failure_report() {
        let (reporter, store, id) = setup().await;
        let outcome = reporter
            .record_outcome(&id, "kitchen", JobOutcome::from_status_code("510"))
            .await
            .unwrap();
        assert_eq!(outcome.job.status, JobStatus::Failed);

        let logs = store.logs(&id).await.unwrap();
        assert_eq!(logs.last().unwrap().level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_report_from_other_printer_is_rejected() {
        let (reporter, store, id) = setup().await;
        let err = reporter
            .record_outcome(&id, "bar", JobOutcome::Printed)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::PrinterMismatch { .. }));
        assert_eq!(store.get(&id).await.unwrap().unwrap().status, JobStatus::Delivered);
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_is_not_applied() {
        let (reporter, _, id) = setup().await;
        reporter.record_outcome(&id, "kitchen", JobOutcome::Printed).await.unwrap();
        let again = reporter.record_outcome(&id, "kitchen", JobOutcome::Printed).await.unwrap();
        assert!(!again.applied);
        assert_eq!(again.job.status, JobStatus::Printed);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (reporter, _, _) = setup().await;
        assert!(matches!(
            reporter.record_outcome("nope", "kitchen", JobOutcome::Printed).await,
            Err(ReportError::JobNotFound(_))
        ));
    }
}
