//! Poll dispatcher - the CloudPRNT side of the queue
//!
//! Printers never get an error from here: unknown printers, inactive
//! printers and malformed reports all receive a "no work" answer. Only
//! storage failures are propagated.

use std::sync::Arc;

use shared::models::{ContentType, PollRequest, PollResponse, PrintJob, PrinterEndpoint};

use super::clock::Clock;
use super::registry::PrinterRegistry;
use super::status::{JobOutcome, ReportError, StatusReporter};
use super::store::{JobStore, JobStoreError, JobStoreResult, TransitionOutcome};

#[derive(Clone)]
pub struct PollDispatcher {
    store: Arc<dyn JobStore>,
    registry: Arc<dyn PrinterRegistry>,
    reporter: StatusReporter,
    clock: Arc<dyn Clock>,
}

impl PollDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<dyn PrinterRegistry>,
        reporter: StatusReporter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            reporter,
            clock,
        }
    }

    /// Active registry entry, or None (logged) for anything else
    fn active_printer(&self, printer_id: &str) -> Option<PrinterEndpoint> {
        match self.registry.get(printer_id) {
            Some(printer) if printer.active => Some(printer),
            Some(_) => {
                tracing::debug!(printer_id = %printer_id, "Poll from inactive printer");
                None
            }
            None => {
                tracing::warn!(printer_id = %printer_id, "Poll from unknown printer");
                None
            }
        }
    }

    /// Handle a status report (`POST`)
    ///
    /// The reported job outcome is recorded first; the answer only peeks at
    /// the queue, nothing is claimed.
    pub async fn status_report(&self, printer_id: &str, body: &[u8]) -> JobStoreResult<PollResponse> {
        if self.active_printer(printer_id).is_none() {
            return Ok(PollResponse::no_work());
        }

        let poll: PollRequest = match serde_json::from_slice(body) {
            Ok(poll) => poll,
            Err(e) => {
                tracing::warn!(printer_id = %printer_id, error = %e, "Malformed status report");
                return Ok(PollResponse::no_work());
            }
        };

        match self.reporter.record_poll(printer_id, &poll).await {
            Ok(_) => {}
            Err(ReportError::Store(e)) => return Err(e),
            Err(e) => tracing::warn!(printer_id = %printer_id, error = %e, "Job report ignored"),
        }

        let next = self.store.peek_next(printer_id, self.clock.now_millis()).await?;
        Ok(match next {
            Some(job) => PollResponse {
                job_ready: true,
                media_types: vec![job.content_type.as_mime().to_string()],
                job_token: Some(job.id),
            },
            None => PollResponse::no_work(),
        })
    }

    /// Handle a content fetch (`GET`) by claiming the next job
    ///
    /// `requested_type` is the printer's `?type=`; a mismatch is logged but
    /// the job is still served, since its bytes cannot be converted.
    pub async fn fetch(
        &self,
        printer_id: &str,
        requested_type: Option<&str>,
    ) -> JobStoreResult<Option<PrintJob>> {
        let Some(printer) = self.active_printer(printer_id) else {
            return Ok(None);
        };

        let Some(job) = self.store.claim_next(printer_id, self.clock.now_millis()).await? else {
            return Ok(None);
        };

        let requested = requested_type.map(|t| t.parse::<ContentType>());
        if requested.as_ref().is_some_and(|r| r.as_ref() != Ok(&job.content_type))
            || !printer.accepts(job.content_type)
        {
            tracing::warn!(
                printer_id = %printer_id,
                job_id = %job.id,
                content_type = %job.content_type,
                requested = ?requested_type,
                "Serving job in a media type the printer did not ask for"
            );
        }

        tracing::info!(
            printer_id = %printer_id,
            job_id = %job.id,
            bytes = job.payload.len(),
            "Job delivered"
        );
        Ok(Some(job))
    }

    /// Handle a print result (`DELETE ?code=&token=`)
    pub async fn report_result(
        &self,
        printer_id: &str,
        code: &str,
        token: &str,
    ) -> JobStoreResult<Option<TransitionOutcome>> {
        if self.active_printer(printer_id).is_none() {
            return Ok(None);
        }

        let outcome = JobOutcome::from_status_code(code);
        match self.reporter.record_outcome(token, printer_id, outcome).await {
            Ok(result) => Ok(Some(result)),
            Err(ReportError::Store(JobStoreError::JobNotFound(id))) | Err(ReportError::JobNotFound(id)) => {
                tracing::warn!(printer_id = %printer_id, job_id = %id, "Result for unknown job");
                Ok(None)
            }
            Err(ReportError::Store(e)) => Err(e),
            Err(e) => {
                tracing::warn!(printer_id = %printer_id, error = %e, "Job result ignored");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::clock::ManualClock;
    use crate::jobs::memory::MemoryJobStore;
    use crate::jobs::registry::{InMemoryPrinterRegistry, PresenceBoard};
    use crate::jobs::store::NewJob;
    use shared::models::JobStatus;

    struct Fixture {
        dispatcher: PollDispatcher,
        store: Arc<MemoryJobStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryJobStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let mut off = PrinterEndpoint::new("patio", "Patio");
        off.active = false;
        let registry = Arc::new(InMemoryPrinterRegistry::with_printers([
            PrinterEndpoint::new("kitchen", "Kitchen"),
            off,
        ]));
        let reporter = StatusReporter::new(store.clone(), Arc::new(PresenceBoard::new()), clock.clone());
        let dispatcher = PollDispatcher::new(store.clone(), registry, reporter, clock.clone());
        Fixture {
            dispatcher,
            store,
            clock,
        }
    }

    async fn enqueue(store: &MemoryJobStore, key: &str, printer: &str) -> PrintJob {
        store
            .create(NewJob::new(key, printer, b"ticket".to_vec()), 500)
            .await
            .unwrap()
            .job
    }

    #[tokio::test]
    async fn test_status_report_peeks_without_claiming() {
        let f = fixture();
        let job = enqueue(&f.store, "a", "kitchen").await;

        let response = f.dispatcher.status_report("kitchen", b"{}").await.unwrap();
        assert!(response.job_ready);
        assert_eq!(response.job_token.as_deref(), Some(job.id.as_str()));
        assert_eq!(response.media_types, vec!["application/vnd.escpos"]);

        let stored = f.store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_unknown_inactive_and_malformed_get_no_work() {
        let f = fixture();
        enqueue(&f.store, "a", "kitchen").await;
        enqueue(&f.store, "b", "patio").await;

        let none = PollResponse::no_work();
        assert_eq!(f.dispatcher.status_report("ghost", b"{}").await.unwrap(), none);
        assert_eq!(f.dispatcher.status_report("patio", b"{}").await.unwrap(), none);
        assert_eq!(f.dispatcher.status_report("kitchen", b"{oops").await.unwrap(), none);

        assert!(f.dispatcher.fetch("ghost", None).await.unwrap().is_none());
        assert!(f.dispatcher.fetch("patio", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_claims_once() {
        let f = fixture();
        let job = enqueue(&f.store, "a", "kitchen").await;

        let delivered = f.dispatcher.fetch("kitchen", None).await.unwrap().unwrap();
        assert_eq!(delivered.id, job.id);
        assert_eq!(delivered.payload, b"ticket");
        assert!(f.dispatcher.fetch("kitchen", None).await.unwrap().is_none());

        let response = f.dispatcher.status_report("kitchen", b"{}").await.unwrap();
        assert!(!response.job_ready);
    }

    #[tokio::test]
    async fn test_type_mismatch_still_serves() {
        let f = fixture();
        enqueue(&f.store, "a", "kitchen").await;
        let job = f
            .dispatcher
            .fetch("kitchen", Some("text/vnd.star.markup"))
            .await
            .unwrap();
        assert!(job.is_some());
    }

    #[tokio::test]
    async fn test_outcome_in_status_report_is_recorded_first() {
        let f = fixture();
        let first = enqueue(&f.store, "a", "kitchen").await;
        let second = enqueue(&f.store, "b", "kitchen").await;
        f.dispatcher.fetch("kitchen", None).await.unwrap();

        f.clock.advance_secs(2);
        let body = format!(r#"{{"jobToken":"{}","jobStatusCode":200}}"#, first.id);
        let response = f.dispatcher.status_report("kitchen", body.as_bytes()).await.unwrap();
        assert_eq!(response.job_token.as_deref(), Some(second.id.as_str()));

        let printed = f.store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(printed.status, JobStatus::Printed);
        assert_eq!(printed.printed_at, Some(3_000));
    }

    #[tokio::test]
    async fn test_report_result_codes() {
        let f = fixture();
        let a = enqueue(&f.store, "a", "kitchen").await;
        let b = enqueue(&f.store, "b", "kitchen").await;
        f.dispatcher.fetch("kitchen", None).await.unwrap();
        f.dispatcher.fetch("kitchen", None).await.unwrap();

        let ok = f.dispatcher.report_result("kitchen", "200 OK", &a.id).await.unwrap().unwrap();
        assert_eq!(ok.job.status, JobStatus::Printed);

        let failed = f.dispatcher.report_result("kitchen", "520", &b.id).await.unwrap().unwrap();
        assert_eq!(failed.job.status, JobStatus::Failed);
        assert_eq!(failed.job.last_error.as_deref(), Some("printer reported status 520"));

        assert!(f.dispatcher.report_result("kitchen", "200", "ghost").await.unwrap().is_none());
    }
}
