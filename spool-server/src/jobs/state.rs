//! Job-level state machine
//!
//! [`JobStatus::apply`] decides which status an event leads to; this module
//! applies the event to a whole [`PrintJob`] (timestamps, retry budget,
//! diagnostics) and produces the matching audit entry. Both job stores run
//! these functions inside their critical section.

use std::cmp::Reverse;

use shared::models::{InvalidTransition, JobEvent, JobLogEntry, LogLevel, PrintJob};

/// Apply `event` to `job` at `now`
///
/// On error the job is left untouched.
pub fn apply_event(job: &mut PrintJob, event: &JobEvent, now: i64) -> Result<(), InvalidTransition> {
    let next = job.status.apply(event)?;

    if matches!(event, JobEvent::Requeue { .. }) && !job.has_retry_budget() {
        return Err(InvalidTransition::new(job.status, event, "retry budget exhausted"));
    }

    match event {
        JobEvent::Claim => {
            job.delivered_at = Some(now.max(job.created_at));
        }
        JobEvent::ConfirmPrinted => {
            let floor = job.delivered_at.unwrap_or(job.created_at);
            job.printed_at = Some(now.max(floor));
        }
        JobEvent::ReportFailure { error } => {
            job.failed_at = Some(now.max(job.created_at));
            job.last_error = Some(error.clone());
        }
        JobEvent::Requeue { retry_at } => {
            job.retry_count += 1;
            job.next_retry_at = *retry_at;
            job.delivered_at = None;
        }
        JobEvent::Cancel => {
            job.cancelled_at = Some(now.max(job.created_at));
        }
    }

    job.status = next;
    Ok(())
}

/// Audit entry for an applied event
pub fn applied_log(job: &PrintJob, event: &JobEvent, now: i64) -> JobLogEntry {
    let (level, message) = match event {
        JobEvent::Claim => (
            LogLevel::Info,
            format!("delivered to printer {}", job.printer_id),
        ),
        JobEvent::ConfirmPrinted => (LogLevel::Info, "printed".to_string()),
        JobEvent::ReportFailure { error } => (LogLevel::Error, format!("failed: {}", error)),
        JobEvent::Requeue { .. } => (
            LogLevel::Info,
            format!("requeued (retry {} of {})", job.retry_count, job.max_retries),
        ),
        JobEvent::Cancel => (LogLevel::Info, "cancelled".to_string()),
    };
    JobLogEntry::new(&job.id, level, message, now)
}

/// Audit entry for a rejected event
pub fn rejected_log(job: &PrintJob, err: &InvalidTransition, now: i64) -> JobLogEntry {
    tracing::warn!(
        job_id = %job.id,
        status = %job.status,
        event = err.event,
        reason = err.reason,
        "Rejected job transition"
    );
    JobLogEntry::warning(&job.id, format!("rejected: {}", err), now)
}

/// Pick the job a poll from `printer_id` should receive at `now`
///
/// Highest priority first, then lowest sequence (FIFO).
pub fn select_next<'a>(
    jobs: impl IntoIterator<Item = &'a PrintJob>,
    printer_id: &str,
    now: i64,
) -> Option<&'a PrintJob> {
    jobs.into_iter()
        .filter(|j| j.printer_id == printer_id && j.is_eligible(now))
        .max_by_key(|j| (j.priority, Reverse(j.sequence)))
}
