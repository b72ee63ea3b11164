//! Retry scheduler
//!
//! One background task sweeping at a fixed interval:
//! 1. DELIVERED jobs not confirmed in time → FAILED ("delivery timeout")
//! 2. FAILED jobs with retry budget left → QUEUED, after a backoff delay
//! 3. Count the jobs that ran out of retries
//!
//! Every change goes through the JobStore state machine, so finished jobs
//! are never overwritten.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::store::{JobStore, JobStoreResult};

/// Error recorded on jobs that were never confirmed
pub const DELIVERY_TIMEOUT_ERROR: &str = "delivery timeout";

/// Delay before a failed job becomes claimable again
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryBackoff {
    Fixed(Duration),
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Default for RetryBackoff {
    fn default() -> Self {
        RetryBackoff::Fixed(Duration::from_secs(10))
    }
}

impl RetryBackoff {
    /// Delay before the given (1-based) retry attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            RetryBackoff::Fixed(d) => d,
            RetryBackoff::Exponential {
                base,
                multiplier,
                max,
            } => {
                let exp = attempt.saturating_sub(1).min(32) as i32;
                let secs = base.as_secs_f64() * multiplier.max(1.0).powi(exp);
                if secs.is_finite() && secs < max.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    max
                }
            }
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// A DELIVERED job unconfirmed for this long counts as failed
    pub delivery_timeout: Duration,
    pub backoff: RetryBackoff,
    /// Time between sweeps
    pub sweep_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(45),
            backoff: RetryBackoff::default(),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Marked failed on delivery timeout
    pub timed_out: usize,
    /// Put back in the queue
    pub requeued: usize,
    /// Out of retries
    pub exhausted: usize,
}

impl SweepReport {
    pub fn is_quiet(&self) -> bool {
        self.timed_out == 0 && self.requeued == 0
    }
}

/// Retry scheduler
///
/// Registered as `TaskKind::Periodic` and started by `start_background_tasks()`.
pub struct RetryScheduler {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            shutdown,
        }
    }

    /// Sweep on every tick until shutdown is signalled
    pub async fn run(self) {
        tracing::info!(
            delivery_timeout_secs = self.policy.delivery_timeout.as_secs(),
            interval_secs = self.policy.sweep_interval.as_secs(),
            "Retry scheduler started"
        );

        let mut interval = tokio::time::interval(self.policy.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Retry scheduler received shutdown signal");
                    break;
                }
            }

            match self.sweep(self.clock.now_millis()).await {
                Ok(report) if report.is_quiet() => {
                    tracing::trace!(exhausted = report.exhausted, "Retry sweep: nothing to do")
                }
                Ok(report) => tracing::info!(
                    timed_out = report.timed_out,
                    requeued = report.requeued,
                    exhausted = report.exhausted,
                    "Retry sweep finished"
                ),
                Err(e) => tracing::error!(error = %e, "Retry sweep failed"),
            }
        }

        tracing::info!("Retry scheduler stopped");
    }

    /// Run a single sweep
    pub async fn sweep(&self, now: i64) -> JobStoreResult<SweepReport> {
        let mut report = SweepReport::default();

        // 1. Timeouts
        let cutoff = now - self.policy.delivery_timeout.as_millis() as i64;
        for job in self.store.stale_deliveries(cutoff).await? {
            let outcome = self.store.mark_failed(&job.id, DELIVERY_TIMEOUT_ERROR, now).await?;
            if outcome.applied {
                tracing::warn!(
                    job_id = %job.id,
                    printer_id = %job.printer_id,
                    "Delivery not confirmed in time"
                );
                report.timed_out += 1;
            }
        }

        // 2. Requeue
        for job in self.store.retryable_failures().await? {
            let delay = self.policy.backoff.delay(job.retry_count + 1);
            let retry_at = now + delay.as_millis() as i64;
            let outcome = self.store.requeue(&job.id, Some(retry_at), now).await?;
            if outcome.applied {
                tracing::info!(
                    job_id = %job.id,
                    retry = outcome.job.retry_count,
                    max_retries = outcome.job.max_retries,
                    retry_at,
                    "Job requeued"
                );
                report.requeued += 1;
            }
        }

        // 3. Exhausted count
        report.exhausted = self.store.terminal_failures().await?.len();

        Ok(report)
    }
}
