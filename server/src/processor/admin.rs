//! Administrative operations.
//!
//! Clear a queue kind, bulk-retry terminal failures, and resynchronize the
//! queue store from the system of record after a restart.

use tracing::info;

use super::{JobProcessor, ProcessorError};
use crate::job::JobKind;

/// Upper bound on rows pulled from the system of record per kind in one
/// administrative sweep.
const RECORD_SWEEP_LIMIT: usize = 500;

impl JobProcessor {
    /// Drop every queued envelope for a kind. Returns how many were removed.
    pub async fn clear_queue(&self, kind: JobKind) -> Result<usize, ProcessorError> {
        let removed = self.store.clear(kind).await?;
        info!(kind = %kind, removed, "queue cleared");
        Ok(removed)
    }

    /// Re-enqueue every terminally failed job of a kind from the system of
    /// record, resetting its durable status to pending. Retry counts start
    /// over: this is an explicit operator decision to re-attempt.
    pub async fn retry_failed(&self, kind: JobKind) -> Result<usize, ProcessorError> {
        let failed = self.record.failed_jobs(kind, RECORD_SWEEP_LIMIT).await?;
        let mut retried = 0;
        for job in failed {
            self.record.mark_pending(job.record).await?;
            self.store
                .enqueue(job.payload, job.priority, Some(job.record))
                .await?;
            self.metrics.record_enqueued();
            retried += 1;
        }
        if retried > 0 {
            info!(kind = %kind, retried, "re-enqueued failed jobs");
        }
        Ok(retried)
    }

    /// Force-enqueue all pending system-of-record jobs into the queue
    /// store. Used after a restart to resynchronize; duplicates are
    /// harmless under at-least-once delivery with idempotent handlers.
    pub async fn resync(&self) -> Result<usize, ProcessorError> {
        let mut total = 0;
        for kind in JobKind::ALL {
            let pending = self.record.pending_jobs(kind, RECORD_SWEEP_LIMIT).await?;
            let count = pending.len();
            for job in pending {
                self.store
                    .enqueue(job.payload, job.priority, Some(job.record))
                    .await?;
                self.metrics.record_enqueued();
            }
            if count > 0 {
                info!(kind = %kind, count, "resynced pending jobs from system of record");
            }
            total += count;
        }
        Ok(total)
    }
}
