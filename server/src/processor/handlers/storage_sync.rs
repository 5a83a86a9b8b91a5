//! Storage replication handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{HandlerError, HandlerOutput, JobHandler};
use crate::job::{Envelope, JobKind, JobPayload};
use crate::providers::StorageReplicator;

/// Reconciles a file's primary and backup storage locations. The provider
/// syncs rather than appends, so replays converge to the same state.
pub struct StorageSyncHandler {
    storage: Arc<dyn StorageReplicator>,
}

impl StorageSyncHandler {
    pub fn new(storage: Arc<dyn StorageReplicator>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl JobHandler for StorageSyncHandler {
    fn kind(&self) -> JobKind {
        JobKind::StorageSync
    }

    async fn execute(&self, envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        let file_id = match &envelope.payload {
            JobPayload::StorageSync { file_id } => *file_id,
            _ => return Err(HandlerError::PayloadMismatch),
        };

        let report = self.storage.sync(file_id).await?;
        debug!(%file_id, repaired = report.repaired, "storage locations reconciled");

        let mut output = HandlerOutput::done();
        for issue in report.degraded {
            output = output.with_degraded(issue);
        }
        Ok(output)
    }
}
