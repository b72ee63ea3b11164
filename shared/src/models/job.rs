//! Print Job Model
//!
//! A print job carries rendered printer bytes from the moment it is enqueued
//! until a printer confirms it (or it runs out of retries). The status enum
//! owns the transition table; field bookkeeping (timestamps, retry counters)
//! is done by the job store on top of it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a print job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting to be claimed by a printer poll
    Queued,
    /// Handed to a printer, confirmation pending
    Delivered,
    /// Printer confirmed the ticket
    Printed,
    /// Delivery or printing failed (retryable while budget remains)
    Failed,
    /// Withdrawn by an operator
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Delivered,
        JobStatus::Printed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Delivered => "DELIVERED",
            JobStatus::Printed => "PRINTED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// PRINTED and CANCELLED never change again.
    ///
    /// FAILED is terminal only once the retry budget is spent, which depends
    /// on the job, see [`PrintJob::is_terminal`].
    pub fn is_final(&self) -> bool {
        matches!(self, JobStatus::Printed | JobStatus::Cancelled)
    }

    /// Resolve the status reached by applying `event`
    ///
    /// ```text
    /// QUEUED --Claim--> DELIVERED --ConfirmPrinted--> PRINTED
    ///                   DELIVERED --ReportFailure---> FAILED --Requeue--> QUEUED
    /// QUEUED | DELIVERED --Cancel--> CANCELLED
    /// ```
    pub fn apply(self, event: &JobEvent) -> Result<JobStatus, InvalidTransition> {
        use JobEvent::*;
        use JobStatus::*;

        match (self, event) {
            (Queued, Claim) => Ok(Delivered),
            (Delivered, ConfirmPrinted) => Ok(Printed),
            (Delivered, ReportFailure { .. }) => Ok(Failed),
            (Failed, Requeue { .. }) => Ok(Queued),
            (Queued | Delivered, Cancel) => Ok(Cancelled),
            (
                Queued | Delivered | Printed | Failed | Cancelled,
                Claim | ConfirmPrinted | ReportFailure { .. } | Requeue { .. } | Cancel,
            ) => Err(InvalidTransition::new(self, event, "not allowed from this status")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobStatus::Queued),
            "DELIVERED" => Ok(JobStatus::Delivered),
            "PRINTED" => Ok(JobStatus::Printed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" | "CANCELED" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Something that happened to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A printer poll took the job
    Claim,
    /// The printer reported a successful print
    ConfirmPrinted,
    /// Delivery or printing failed
    ReportFailure { error: String },
    /// Put a failed job back in the queue, eligible from `retry_at`
    Requeue { retry_at: Option<i64> },
    /// Operator cancelled the job
    Cancel,
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Claim => "claim",
            JobEvent::ConfirmPrinted => "confirm_printed",
            JobEvent::ReportFailure { .. } => "report_failure",
            JobEvent::Requeue { .. } => "requeue",
            JobEvent::Cancel => "cancel",
        }
    }
}

/// Rejected status transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {event} job in status {from}: {reason}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub event: &'static str,
    pub reason: &'static str,
}

impl InvalidTransition {
    pub fn new(from: JobStatus, event: &JobEvent, reason: &'static str) -> Self {
        Self {
            from,
            event: event.name(),
            reason,
        }
    }
}

/// Kind of ticket a job prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Receipt,
    Kitchen,
    Label,
    Custom,
}

/// Payload format, sent to the printer as the `Content-Type` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContentType {
    /// Raw ESC/POS command bytes
    #[default]
    #[serde(rename = "application/vnd.escpos")]
    EscPos,
    #[serde(rename = "text/plain")]
    TextPlain,
    #[serde(rename = "application/vnd.star.starprnt")]
    StarPrnt,
    #[serde(rename = "text/vnd.star.markup")]
    StarMarkup,
}

impl ContentType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::EscPos => "application/vnd.escpos",
            ContentType::TextPlain => "text/plain",
            ContentType::StarPrnt => "application/vnd.star.starprnt",
            ContentType::StarMarkup => "text/vnd.star.markup",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Printers may append parameters (e.g. "; charset=utf-8")
        let mime = s.split(';').next().unwrap_or_default().trim();
        match mime.to_ascii_lowercase().as_str() {
            "application/vnd.escpos" => Ok(ContentType::EscPos),
            "text/plain" => Ok(ContentType::TextPlain),
            "application/vnd.star.starprnt" => Ok(ContentType::StarPrnt),
            "text/vnd.star.markup" => Ok(ContentType::StarMarkup),
            other => Err(format!("unsupported content type: {}", other)),
        }
    }
}

/// A queued unit of printer work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub idempotency_key: String,
    pub printer_id: String,
    pub job_type: JobType,
    pub content_type: ContentType,
    /// Rendered printer bytes, never modified after creation
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    pub status: JobStatus,
    /// Higher is served first
    #[serde(default)]
    pub priority: i32,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Not claimable before this instant (unix millis)
    pub next_retry_at: Option<i64>,
    /// Store-assigned FIFO position
    pub sequence: u64,
    pub created_at: i64,
    pub delivered_at: Option<i64>,
    pub printed_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub last_error: Option<String>,
    pub order_id: Option<String>,
    pub table_id: Option<String>,
    /// Source job of a manual reprint
    pub reprint_of: Option<String>,
}

impl PrintJob {
    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// No further transition will ever happen on this job
    pub fn is_terminal(&self) -> bool {
        self.status.is_final() || (self.status == JobStatus::Failed && !self.has_retry_budget())
    }

    /// Claimable by a poll at `now`
    pub fn is_eligible(&self, now: i64) -> bool {
        self.status == JobStatus::Queued && self.next_retry_at.is_none_or(|at| at <= now)
    }
}

/// Severity of a job log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Append-only audit record for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: i64,
}

impl JobLogEntry {
    pub fn new(job_id: impl Into<String>, level: LogLevel, message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            job_id: job_id.into(),
            level,
            message: message.into(),
            timestamp,
        }
    }

    pub fn info(job_id: impl Into<String>, message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(job_id, LogLevel::Info, message, timestamp)
    }

    pub fn warning(job_id: impl Into<String>, message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(job_id, LogLevel::Warning, message, timestamp)
    }

    pub fn error(job_id: impl Into<String>, message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(job_id, LogLevel::Error, message, timestamp)
    }
}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub queued: u64,
    pub delivered: u64,
    pub printed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Delivered => self.delivered += 1,
            JobStatus::Printed => self.printed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.queued + self.delivered + self.printed + self.failed + self.cancelled
    }
}

mod payload_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}
