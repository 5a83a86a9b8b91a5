//! System of record.
//!
//! The durable store that survives process restarts and queue-store flushes.
//! It is the authority for terminal job status; the processing core talks to
//! it through this narrow interface only.

mod memory;
mod postgres;

pub use memory::{MemRecord, RecordStatus};
pub use postgres::PgRecord;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{JobKind, JobPayload};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed record payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Descriptor of a job row as stored durably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingJob {
    pub record: Uuid,
    pub payload: JobPayload,
    pub priority: i32,
}

/// Document fields projected into the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub file_id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    /// Jobs waiting to be (re-)fed into the queue store, best first.
    async fn pending_jobs(
        &self,
        kind: JobKind,
        limit: usize,
    ) -> Result<Vec<PendingJob>, RecordError>;

    /// Terminally failed jobs, for the bulk-retry administrative action.
    async fn failed_jobs(&self, kind: JobKind, limit: usize)
        -> Result<Vec<PendingJob>, RecordError>;

    async fn mark_pending(&self, record: Uuid) -> Result<(), RecordError>;
    async fn mark_processing(&self, record: Uuid) -> Result<(), RecordError>;
    async fn mark_completed(&self, record: Uuid) -> Result<(), RecordError>;
    async fn mark_failed(&self, record: Uuid, reason: &str) -> Result<(), RecordError>;

    /// Overwrite the stored extracted text for a file (idempotent).
    async fn save_extracted_text(&self, file_id: Uuid, text: &str) -> Result<(), RecordError>;

    async fn extracted_text(&self, file_id: Uuid) -> Result<Option<String>, RecordError>;

    async fn document_meta(&self, file_id: Uuid) -> Result<Option<DocumentMeta>, RecordError>;
}
