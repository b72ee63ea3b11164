//! Enqueue service - validates submissions and creates jobs
//!
//! A known idempotency key is answered from the store first. Everything else
//! is validated before a job is created; a rejected request never produces one.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{ContentType, JobLogEntry, JobStatus, JobType, PrintJob};
use spool_printer::PrintError;
use thiserror::Error;

use super::clock::Clock;
use super::registry::PrinterRegistry;
use super::store::{JobStore, JobStoreError, NewJob};
use crate::audit_log;
use crate::printing::{DEFAULT_PAPER_WIDTH, Receipt, ReceiptEncoder};

/// Longest accepted idempotency key
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 200;

/// Upper bound for a caller supplied `max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    #[error("Printer is inactive: {0}")]
    PrinterInactive(String),

    #[error("Invalid idempotency key: {0}")]
    InvalidKey(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("max_retries {requested} exceeds limit {limit}")]
    RetryLimit { requested: u32, limit: u32 },

    #[error("Receipt has no items")]
    EmptyReceipt,

    #[error("Invalid receipt options: {0}")]
    Receipt(#[from] PrintError),

    #[error("Print job not found: {0}")]
    JobNotFound(String),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

impl From<EnqueueError> for AppError {
    fn from(err: EnqueueError) -> Self {
        match err {
            EnqueueError::PrinterNotFound(id) => AppError::printer_not_found(id),
            EnqueueError::PrinterInactive(id) => AppError::printer_not_available(id),
            EnqueueError::InvalidKey(msg) => {
                AppError::with_message(ErrorCode::IdempotencyKeyInvalid, msg)
            }
            EnqueueError::InvalidPayload(msg) => AppError::with_message(ErrorCode::PayloadInvalid, msg),
            EnqueueError::RetryLimit { requested, limit } => AppError::with_message(
                ErrorCode::RetryLimitExceeded,
                format!("max_retries {} exceeds limit {}", requested, limit),
            )
            .with_detail("limit", limit),
            EnqueueError::EmptyReceipt => AppError::new(ErrorCode::ReceiptEmpty),
            EnqueueError::Receipt(e) => {
                AppError::with_message(ErrorCode::ReceiptOptionsInvalid, e.to_string())
            }
            EnqueueError::JobNotFound(id) => AppError::job_not_found(id),
            EnqueueError::Store(e) => e.into(),
        }
    }
}

/// Order and table a job belongs to
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    #[serde(alias = "order_id")]
    pub order_id: Option<String>,
    #[serde(alias = "table_id")]
    pub table_id: Option<String>,
}

/// Job submission
///
/// Exactly one of `payload`, `payloadBase64` or `receipt` must be set.
/// Field names are camelCase; the snake_case spellings are accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(alias = "idempotency_key")]
    pub idempotency_key: String,
    #[serde(alias = "printer_id")]
    pub printer_id: String,
    #[serde(default, alias = "job_type")]
    pub job_type: JobType,
    /// Defaults to ESC/POS
    #[serde(alias = "content_type")]
    pub content_type: Option<ContentType>,
    /// Payload as text, sent as UTF-8 bytes
    pub payload: Option<String>,
    #[serde(alias = "payload_base64")]
    pub payload_base64: Option<String>,
    /// Receipt rendered to ESC/POS by the server
    pub receipt: Option<Receipt>,
    #[serde(default)]
    pub priority: i32,
    #[serde(alias = "max_retries")]
    pub max_retries: Option<u32>,
    #[serde(alias = "order_id")]
    pub order_id: Option<String>,
    #[serde(alias = "table_id")]
    pub table_id: Option<String>,
    /// Same as `orderId` / `tableId`; the top-level fields win
    pub correlation: Option<Correlation>,
}

/// Answer to an enqueue call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub job_id: String,
    pub status: JobStatus,
    /// False when the idempotency key was already known
    pub created: bool,
}

/// Creates jobs after validating them against the registry
#[derive(Clone)]
pub struct EnqueueService {
    store: Arc<dyn JobStore>,
    registry: Arc<dyn PrinterRegistry>,
    clock: Arc<dyn Clock>,
    default_max_retries: u32,
    /// Receipt width when the request does not set one
    paper_width: usize,
}

impl EnqueueService {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<dyn PrinterRegistry>,
        clock: Arc<dyn Clock>,
        default_max_retries: u32,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            default_max_retries,
            paper_width: DEFAULT_PAPER_WIDTH,
        }
    }

    pub fn with_paper_width(mut self, paper_width: usize) -> Self {
        self.paper_width = paper_width;
        self
    }

    /// Store a new job, or return the one already created for this key
    ///
    /// A known key is answered before the printer and payload are checked,
    /// so a replay succeeds even after the printer was deactivated.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<EnqueueReceipt, EnqueueError> {
        let key = check_key(&request.idempotency_key)?;
        if let Some(existing) = self.store.find_by_key(&key).await? {
            tracing::debug!(job_id = %existing.id, key = %key, "Idempotent replay");
            return Ok(EnqueueReceipt {
                job_id: existing.id,
                status: existing.status,
                created: false,
            });
        }

        let job = self.validate(key, request)?;
        let outcome = self.store.create(job, self.clock.now_millis()).await?;
        if outcome.created {
            tracing::info!(
                job_id = %outcome.job.id,
                printer_id = %outcome.job.printer_id,
                bytes = outcome.job.payload.len(),
                "Print job enqueued"
            );
        } else {
            tracing::debug!(job_id = %outcome.job.id, "Idempotent replay after race");
        }

        Ok(EnqueueReceipt {
            job_id: outcome.job.id,
            status: outcome.job.status,
            created: outcome.created,
        })
    }

    /// Queue a copy of an existing job's payload
    ///
    /// The original job only gains a log entry.
    pub async fn reprint(&self, job_id: &str) -> Result<PrintJob, EnqueueError> {
        let original = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| EnqueueError::JobNotFound(job_id.to_string()))?;

        self.check_printer(&original.printer_id)?;

        let job = NewJob {
            idempotency_key: format!("reprint:{}:{}", original.id, uuid::Uuid::new_v4()),
            printer_id: original.printer_id.clone(),
            job_type: original.job_type,
            content_type: original.content_type,
            payload: original.payload.clone(),
            priority: original.priority,
            max_retries: original.max_retries,
            order_id: original.order_id.clone(),
            table_id: original.table_id.clone(),
            reprint_of: Some(original.id.clone()),
        };

        let now = self.clock.now_millis();
        let copy = self.store.create(job, now).await?.job;
        self.store
            .append_log(JobLogEntry::info(
                &original.id,
                format!("reprinted as {}", copy.id),
                now,
            ))
            .await?;

        let resource = format!("job:{}", original.id);
        let details = format!("new job {}", copy.id);
        audit_log!("operator", "reprint", resource.as_str(), details.as_str());
        Ok(copy)
    }

    fn check_printer(&self, printer_id: &str) -> Result<(), EnqueueError> {
        match self.registry.get(printer_id) {
            None => Err(EnqueueError::PrinterNotFound(printer_id.to_string())),
            Some(printer) if !printer.active => {
                Err(EnqueueError::PrinterInactive(printer_id.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    fn validate(&self, key: String, request: EnqueueRequest) -> Result<NewJob, EnqueueError> {
        self.check_printer(&request.printer_id)?;

        let max_retries = request.max_retries.unwrap_or(self.default_max_retries);
        if max_retries > MAX_RETRIES_LIMIT {
            return Err(EnqueueError::RetryLimit {
                requested: max_retries,
                limit: MAX_RETRIES_LIMIT,
            });
        }

        let (payload, content_type) = match (request.payload, request.payload_base64, request.receipt) {
            (Some(text), None, None) => (text.into_bytes(), request.content_type.unwrap_or_default()),
            (None, Some(encoded), None) => {
                let bytes = BASE64
                    .decode(encoded.trim())
                    .map_err(|e| EnqueueError::InvalidPayload(format!("invalid base64: {}", e)))?;
                (bytes, request.content_type.unwrap_or_default())
            }
            (None, None, Some(receipt)) => {
                if request
                    .content_type
                    .is_some_and(|ct| ct != ContentType::EscPos)
                {
                    return Err(EnqueueError::InvalidPayload(
                        "receipts render to application/vnd.escpos only".into(),
                    ));
                }
                if receipt.items.is_empty() {
                    return Err(EnqueueError::EmptyReceipt);
                }
                let options = receipt.options.or_width(self.paper_width);
                ReceiptEncoder::validate(&options)?;
                let bytes = ReceiptEncoder::new(options).encode(&receipt.items);
                (bytes, ContentType::EscPos)
            }
            (None, None, None) => {
                return Err(EnqueueError::InvalidPayload(
                    "one of payload, payloadBase64 or receipt is required".into(),
                ));
            }
            _ => {
                return Err(EnqueueError::InvalidPayload(
                    "only one of payload, payloadBase64 or receipt may be set".into(),
                ));
            }
        };

        if payload.is_empty() {
            return Err(EnqueueError::InvalidPayload("payload is empty".into()));
        }

        let correlation = request.correlation.unwrap_or_default();
        Ok(NewJob {
            idempotency_key: key,
            printer_id: request.printer_id,
            job_type: request.job_type,
            content_type,
            payload,
            priority: request.priority,
            max_retries,
            order_id: request.order_id.or(correlation.order_id),
            table_id: request.table_id.or(correlation.table_id),
            reprint_of: None,
        })
    }
}

fn check_key(raw: &str) -> Result<String, EnqueueError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(EnqueueError::InvalidKey("idempotency key is blank".into()));
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(EnqueueError::InvalidKey(format!(
            "idempotency key longer than {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::clock::ManualClock;
    use crate::jobs::memory::MemoryJobStore;
    use crate::jobs::registry::InMemoryPrinterRegistry;
    use crate::printing::{ReceiptItem, ReceiptOptions};
    use rust_decimal::Decimal;
    use shared::models::PrinterEndpoint;

    fn setup() -> (EnqueueService, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let mut off = PrinterEndpoint::new("patio", "Patio");
        off.active = false;
        let registry = Arc::new(InMemoryPrinterRegistry::with_printers([
            PrinterEndpoint::new("kitchen", "Kitchen"),
            off,
        ]));
        let service = EnqueueService::new(
            store.clone(),
            registry,
            Arc::new(ManualClock::new(1_000)),
            3,
        );
        (service, store)
    }

    fn request(key: &str, payload: &str) -> EnqueueRequest {
        EnqueueRequest {
            idempotency_key: key.into(),
            printer_id: "kitchen".into(),
            payload: Some(payload.into()),
            ..EnqueueRequest::default()
        }
    }

    #[tokio::test]
    async fn test_enqueue_then_replay() {
        let (service, store) = setup();
        let first = service.enqueue(request("order-1", "hello")).await.unwrap();
        assert!(first.created);
        assert_eq!(first.status, JobStatus::Queued);

        let replay = service.enqueue(request("order-1", "changed")).await.unwrap();
        assert!(!replay.created);
        assert_eq!(replay.job_id, first.job_id);

        let job = store.get(&first.job_id).await.unwrap().unwrap();
        assert_eq!(job.payload, b"hello");
        assert_eq!(job.max_retries, 3);
    }

    #[tokio::test]
    async fn test_replay_after_printer_deactivated() {
        let store = Arc::new(MemoryJobStore::new());
        let registry = Arc::new(InMemoryPrinterRegistry::with_printers([PrinterEndpoint::new(
            "kitchen", "Kitchen",
        )]));
        let service = EnqueueService::new(
            store.clone(),
            registry.clone(),
            Arc::new(ManualClock::new(1_000)),
            3,
        );

        let first = service.enqueue(request("k1", "hi")).await.unwrap();
        assert!(registry.set_active("kitchen", false));

        let replay = service.enqueue(request("k1", "hi")).await.unwrap();
        assert!(!replay.created);
        assert_eq!(replay.job_id, first.job_id);

        // a fresh key still sees the inactive printer
        assert!(matches!(
            service.enqueue(request("k2", "hi")).await,
            Err(EnqueueError::PrinterInactive(_))
        ));
        assert_eq!(store.stats().await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn test_correlation_object_fills_order_and_table() {
        let (service, store) = setup();
        let req: EnqueueRequest = serde_json::from_value(serde_json::json!({
            "printerId": "kitchen",
            "idempotencyKey": "corr-1",
            "payload": "hi",
            "contentType": "text/plain",
            "jobType": "kitchen",
            "correlation": { "orderId": "o-9", "tableId": "t-4" }
        }))
        .unwrap();
        let receipt = service.enqueue(req).await.unwrap();
        let job = store.get(&receipt.job_id).await.unwrap().unwrap();
        assert_eq!(job.content_type, ContentType::TextPlain);
        assert_eq!(job.job_type, JobType::Kitchen);
        assert_eq!(job.order_id.as_deref(), Some("o-9"));
        assert_eq!(job.table_id.as_deref(), Some("t-4"));

        let snake: EnqueueRequest = serde_json::from_value(serde_json::json!({
            "printer_id": "kitchen",
            "idempotency_key": "corr-2",
            "payload_base64": "aGk=",
            "max_retries": 1,
            "order_id": "o-1"
        }))
        .unwrap();
        assert_eq!(snake.idempotency_key, "corr-2");
        assert_eq!(snake.payload_base64.as_deref(), Some("aGk="));
        assert_eq!(snake.max_retries, Some(1));
        assert_eq!(snake.order_id.as_deref(), Some("o-1"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_and_inactive_printers() {
        let (service, _) = setup();

        let mut req = request("a", "x");
        req.printer_id = "nowhere".into();
        let err = service.enqueue(req).await.unwrap_err();
        assert!(matches!(err, EnqueueError::PrinterNotFound(_)));

        let mut req = request("b", "x");
        req.printer_id = "patio".into();
        let err: AppError = service.enqueue(req).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::PrinterNotAvailable);
        assert_eq!(err.http_status(), http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_rejects_bad_keys() {
        let (service, store) = setup();
        assert!(matches!(
            service.enqueue(request("   ", "x")).await,
            Err(EnqueueError::InvalidKey(_))
        ));
        let long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(matches!(
            service.enqueue(request(&long, "x")).await,
            Err(EnqueueError::InvalidKey(_))
        ));
        assert_eq!(store.stats().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_payload_sources_are_exclusive() {
        let (service, _) = setup();

        let mut both = request("a", "text");
        both.payload_base64 = Some("aGk=".into());
        assert!(matches!(
            service.enqueue(both).await,
            Err(EnqueueError::InvalidPayload(_))
        ));

        let none = EnqueueRequest {
            idempotency_key: "b".into(),
            printer_id: "kitchen".into(),
            ..EnqueueRequest::default()
        };
        assert!(matches!(
            service.enqueue(none).await,
            Err(EnqueueError::InvalidPayload(_))
        ));

        assert!(matches!(
            service.enqueue(request("c", "")).await,
            Err(EnqueueError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_base64_payload_decoded() {
        let (service, store) = setup();
        let req = EnqueueRequest {
            idempotency_key: "b64".into(),
            printer_id: "kitchen".into(),
            payload_base64: Some("G0BoaQ==".into()),
            ..EnqueueRequest::default()
        };
        let receipt = service.enqueue(req).await.unwrap();
        let job = store.get(&receipt.job_id).await.unwrap().unwrap();
        assert_eq!(job.payload, vec![0x1B, 0x40, b'h', b'i']);

        let bad = EnqueueRequest {
            idempotency_key: "bad".into(),
            printer_id: "kitchen".into(),
            payload_base64: Some("***".into()),
            ..EnqueueRequest::default()
        };
        assert!(matches!(
            service.enqueue(bad).await,
            Err(EnqueueError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_limit() {
        let (service, _) = setup();
        let mut req = request("a", "x");
        req.max_retries = Some(MAX_RETRIES_LIMIT + 1);
        let err: AppError = service.enqueue(req).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::RetryLimitExceeded);
    }

    #[tokio::test]
    async fn test_receipt_is_rendered() {
        let (service, store) = setup();
        let req = EnqueueRequest {
            idempotency_key: "r".into(),
            printer_id: "kitchen".into(),
            receipt: Some(Receipt {
                items: vec![ReceiptItem::new("Soup", 1, Decimal::new(450, 2))],
                options: ReceiptOptions::kitchen(),
            }),
            ..EnqueueRequest::default()
        };
        let receipt = service.enqueue(req).await.unwrap();
        let job = store.get(&receipt.job_id).await.unwrap().unwrap();
        assert_eq!(job.content_type, ContentType::EscPos);
        assert!(job.payload.starts_with(&spool_printer::INIT));
        assert!(job.payload.ends_with(&spool_printer::CutMode::Full.sequence(3)));
    }

    #[tokio::test]
    async fn test_receipt_validation() {
        let (service, _) = setup();

        let empty = EnqueueRequest {
            idempotency_key: "e".into(),
            printer_id: "kitchen".into(),
            receipt: Some(Receipt {
                items: Vec::new(),
                options: ReceiptOptions::default(),
            }),
            ..EnqueueRequest::default()
        };
        assert!(matches!(
            service.enqueue(empty).await,
            Err(EnqueueError::EmptyReceipt)
        ));

        let narrow = EnqueueRequest {
            idempotency_key: "n".into(),
            printer_id: "kitchen".into(),
            receipt: Some(Receipt {
                items: vec![ReceiptItem::new("Soup", 1, Decimal::ONE)],
                options: ReceiptOptions {
                    width: Some(4),
                    ..ReceiptOptions::default()
                },
            }),
            ..EnqueueRequest::default()
        };
        let err: AppError = service.enqueue(narrow).await.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ReceiptOptionsInvalid);
    }

    #[tokio::test]
    async fn test_reprint_clones_payload() {
        let (service, store) = setup();
        let original = service.enqueue(request("order-1", "ticket")).await.unwrap();

        let copy = service.reprint(&original.job_id).await.unwrap();
        assert_ne!(copy.id, original.job_id);
        assert_eq!(copy.payload, b"ticket");
        assert_eq!(copy.reprint_of.as_deref(), Some(original.job_id.as_str()));
        assert!(copy.idempotency_key.starts_with(&format!("reprint:{}:", original.job_id)));

        let source = store.get(&original.job_id).await.unwrap().unwrap();
        assert_eq!(source.status, JobStatus::Queued);
        let logs = store.logs(&original.job_id).await.unwrap();
        assert_eq!(logs.last().unwrap().message, format!("reprinted as {}", copy.id));

        assert!(matches!(
            service.reprint("missing").await,
            Err(EnqueueError::JobNotFound(_))
        ));
    }
}
