//! Retry policy and failure routing.
//!
//! Exponential backoff with a max-attempt cutoff. The backoff wait happens
//! on a detached task so re-enqueueing never blocks a dispatcher tick; jobs
//! past the cutoff become terminal and are mirrored to the system of record.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::JobProcessor;
use crate::job::{now_ms, Envelope, JobStatus};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Delay before the attempt that brings the job to `retry_count`
    /// failures: `retry_delay * 2^(retry_count - 1)`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exp = retry_count.saturating_sub(1).min(16);
        self.retry_delay.saturating_mul(1u32 << exp)
    }

    #[inline]
    pub fn exhausted(&self, retry_count: u32) -> bool {
        retry_count > self.max_retries
    }
}

impl JobProcessor {
    /// Classify a failed execution: schedule a backoff retry or mark the
    /// job permanently failed.
    pub(crate) async fn route_failure(&self, mut envelope: Envelope, error: String, timed_out: bool) {
        envelope.retry_count += 1;
        envelope.last_error = Some(error.clone());

        let policy = self.retry_policy();
        if policy.exhausted(envelope.retry_count) {
            envelope.status = JobStatus::Failed;
            envelope.completed_at = now_ms();
            self.metrics.record_permanent_failure();
            warn!(
                job_id = envelope.id,
                kind = %envelope.kind(),
                attempts = envelope.retry_count,
                timed_out,
                error = %error,
                "job permanently failed; retries exhausted"
            );
            if let Some(record) = envelope.record {
                if let Err(e) = self.record.mark_failed(record, &error).await {
                    error!(job_id = envelope.id, error = %e, "failed to persist terminal failure");
                }
            }
            return;
        }

        let delay = policy.backoff(envelope.retry_count);
        self.metrics.record_retry_scheduled();
        info!(
            job_id = envelope.id,
            kind = %envelope.kind(),
            retry = envelope.retry_count,
            delay_ms = delay.as_millis() as u64,
            timed_out,
            "scheduling retry"
        );

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let job_id = envelope.id;
            if let Err(e) = store.requeue(envelope).await {
                error!(job_id, error = %e, "failed to requeue job after backoff");
            }
        });
    }
}
