//! In-memory system of record.
//!
//! Used when no database is configured (single-node development) and as the
//! record double in tests. Same contract as [`PgRecord`], no durability.
//!
//! [`PgRecord`]: super::PgRecord

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use super::{DocumentMeta, PendingJob, RecordError, SystemOfRecord};
use crate::job::{JobKind, JobPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
struct JobRow {
    payload: JobPayload,
    priority: i32,
    status: RecordStatus,
    failure_reason: Option<String>,
    inserted: u64,
}

#[derive(Default)]
struct Inner {
    jobs: FxHashMap<Uuid, JobRow>,
    texts: FxHashMap<Uuid, String>,
    documents: FxHashMap<Uuid, DocumentMeta>,
    insert_counter: u64,
}

#[derive(Default)]
pub struct MemRecord {
    inner: RwLock<Inner>,
}

impl MemRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a durable job row in `pending` state. Returns its record id.
    pub fn insert_job(&self, payload: JobPayload, priority: i32) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write();
        inner.insert_counter += 1;
        let inserted = inner.insert_counter;
        inner.jobs.insert(
            id,
            JobRow {
                payload,
                priority,
                status: RecordStatus::Pending,
                failure_reason: None,
                inserted,
            },
        );
        id
    }

    pub fn insert_document(&self, meta: DocumentMeta) {
        self.inner.write().documents.insert(meta.file_id, meta);
    }

    pub fn job_status(&self, record: Uuid) -> Option<RecordStatus> {
        self.inner.read().jobs.get(&record).map(|r| r.status)
    }

    pub fn failure_reason(&self, record: Uuid) -> Option<String> {
        self.inner
            .read()
            .jobs
            .get(&record)
            .and_then(|r| r.failure_reason.clone())
    }

    fn jobs_with_status(
        &self,
        kind: JobKind,
        status: RecordStatus,
        limit: usize,
    ) -> Vec<PendingJob> {
        let inner = self.inner.read();
        let mut rows: Vec<(&Uuid, &JobRow)> = inner
            .jobs
            .iter()
            .filter(|(_, row)| row.status == status && row.payload.kind() == kind)
            .collect();
        rows.sort_by(|a, b| {
            b.1.priority
                .cmp(&a.1.priority)
                .then_with(|| a.1.inserted.cmp(&b.1.inserted))
        });
        rows.into_iter()
            .take(limit)
            .map(|(id, row)| PendingJob {
                record: *id,
                payload: row.payload.clone(),
                priority: row.priority,
            })
            .collect()
    }

    fn set_status(&self, record: Uuid, status: RecordStatus, reason: Option<&str>) {
        if let Some(row) = self.inner.write().jobs.get_mut(&record) {
            row.status = status;
            row.failure_reason = reason.map(str::to_owned);
        }
    }
}

#[async_trait]
impl SystemOfRecord for MemRecord {
    async fn pending_jobs(
        &self,
        kind: JobKind,
        limit: usize,
    ) -> Result<Vec<PendingJob>, RecordError> {
        Ok(self.jobs_with_status(kind, RecordStatus::Pending, limit))
    }

    async fn failed_jobs(
        &self,
        kind: JobKind,
        limit: usize,
    ) -> Result<Vec<PendingJob>, RecordError> {
        Ok(self.jobs_with_status(kind, RecordStatus::Failed, limit))
    }

    async fn mark_pending(&self, record: Uuid) -> Result<(), RecordError> {
        self.set_status(record, RecordStatus::Pending, None);
        Ok(())
    }

    async fn mark_processing(&self, record: Uuid) -> Result<(), RecordError> {
        self.set_status(record, RecordStatus::Processing, None);
        Ok(())
    }

    async fn mark_completed(&self, record: Uuid) -> Result<(), RecordError> {
        self.set_status(record, RecordStatus::Completed, None);
        Ok(())
    }

    async fn mark_failed(&self, record: Uuid, reason: &str) -> Result<(), RecordError> {
        self.set_status(record, RecordStatus::Failed, Some(reason));
        Ok(())
    }

    async fn save_extracted_text(&self, file_id: Uuid, text: &str) -> Result<(), RecordError> {
        self.inner.write().texts.insert(file_id, text.to_owned());
        Ok(())
    }

    async fn extracted_text(&self, file_id: Uuid) -> Result<Option<String>, RecordError> {
        Ok(self.inner.read().texts.get(&file_id).cloned())
    }

    async fn document_meta(&self, file_id: Uuid) -> Result<Option<DocumentMeta>, RecordError> {
        Ok(self.inner.read().documents.get(&file_id).cloned())
    }
}
