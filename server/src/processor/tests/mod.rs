//! Test suite for the job processing core - organized by functionality.
//!
//! Run all tests: `cargo test`
//! Run specific module: `cargo test processor::tests::dispatcher`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use super::handlers::{HandlerError, HandlerOutput, HandlerRegistry, JobHandler};
use super::JobProcessor;
use crate::config::ProcessorConfig;
use crate::job::{Envelope, ExtractionMethod, IndexAction, JobKind, JobPayload};
use crate::providers::{
    ExtractedText, ProviderError, SearchDocument, SearchIndex, StorageReplicator, SyncReport,
    TextExtractor,
};
use crate::record::{MemRecord, SystemOfRecord};
use crate::store::{MemoryStore, QueueStore, StoreError};

// Core queue store behavior: ordering, atomic dequeue, clear
mod store;




// Health verdict bands
mod health;

// Counter bookkeeping
mod metrics;


/// Config with short intervals so tests drive ticks directly.
pub fn test_config() -> ProcessorConfig {
    ProcessorConfig {
        batch_size: 10,
        max_concurrent_jobs: 4,
        job_timeout_ms: 250,
        retry_delay_ms: 10,
        max_retries: 3,
        tick_interval_ms: 20,
        depth_warning: 500,
        depth_critical: 2_000,
        failure_ratio_threshold: 0.10,
    }
}

/// Build a processor over fresh in-memory store and record.
pub fn setup(
    handlers: HandlerRegistry,
    config: ProcessorConfig,
) -> (Arc<JobProcessor>, Arc<MemoryStore>, Arc<MemRecord>) {
    let store = Arc::new(MemoryStore::new());
    let record = Arc::new(MemRecord::new());
    let processor = JobProcessor::new(
        Arc::clone(&store) as Arc<dyn QueueStore>,
        Arc::clone(&record) as Arc<dyn SystemOfRecord>,
        handlers,
        config,
    );
    (processor, store, record)
}

pub fn extraction_payload() -> JobPayload {
    JobPayload::Extraction {
        file_id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        method: ExtractionMethod::Auto,
    }
}

pub fn sync_payload() -> JobPayload {
    JobPayload::StorageSync {
        file_id: Uuid::new_v4(),
    }
}

pub fn index_payload(action: IndexAction) -> JobPayload {
    JobPayload::SearchIndexing {
        file_id: Uuid::new_v4(),
        action,
    }
}

// ============== Handler doubles ==============

/// Records the priority of every envelope it executes, in order.
pub struct RecordingHandler {
    kind: JobKind,
    pub executed: Arc<Mutex<Vec<i32>>>,
}

impl RecordingHandler {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        self.executed.lock().push(envelope.priority);
        Ok(HandlerOutput::done())
    }
}

/// Always fails with an upstream provider error.
pub struct FailingHandler {
    kind: JobKind,
}

impl FailingHandler {
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for FailingHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        Err(HandlerError::Provider(ProviderError::Upstream(
            "simulated provider outage".to_string(),
        )))
    }
}

/// Sleeps longer than any sane job timeout.
pub struct SleepyHandler {
    kind: JobKind,
    sleep: Duration,
}

impl SleepyHandler {
    pub fn new(kind: JobKind, sleep: Duration) -> Self {
        Self { kind, sleep }
    }
}

#[async_trait]
impl JobHandler for SleepyHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        tokio::time::sleep(self.sleep).await;
        Ok(HandlerOutput::done())
    }
}

/// Tracks how many executions overlap, to observe the concurrency cap.
pub struct ConcurrencyProbe {
    kind: JobKind,
    current: AtomicUsize,
    pub max_observed: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            current: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JobHandler for ConcurrencyProbe {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(HandlerOutput::done())
    }
}

// ============== Provider doubles ==============

pub struct FakeExtractor;

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(
        &self,
        file_id: Uuid,
        _org_id: Uuid,
        method: ExtractionMethod,
    ) -> Result<ExtractedText, ProviderError> {
        Ok(ExtractedText {
            text: format!("extracted content of {}", file_id),
            method_used: method,
            pages: Some(1),
        })
    }
}

#[derive(Default)]
pub struct FakeReplicator {
    pub degraded: Vec<String>,
}

#[async_trait]
impl StorageReplicator for FakeReplicator {
    async fn sync(&self, _file_id: Uuid) -> Result<SyncReport, ProviderError> {
        Ok(SyncReport {
            repaired: false,
            degraded: self.degraded.clone(),
        })
    }
}

#[derive(Default)]
pub struct FakeIndex {
    pub documents: Mutex<FxHashMap<Uuid, SearchDocument>>,
    pub upserts: AtomicUsize,
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), ProviderError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().insert(doc.file_id, doc.clone());
        Ok(())
    }

    async fn delete(&self, file_id: Uuid) -> Result<(), ProviderError> {
        self.documents.lock().remove(&file_id);
        Ok(())
    }
}

// ============== Store double ==============

/// Delegates to a real MemoryStore but fails every call touching one kind,
/// simulating a partially unreachable backing store.
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    poisoned: JobKind,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, poisoned: JobKind) -> Self {
        Self { inner, poisoned }
    }

    fn check(&self, kind: JobKind) -> Result<(), StoreError> {
        if kind == self.poisoned {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn enqueue(
        &self,
        payload: JobPayload,
        priority: i32,
        record: Option<Uuid>,
    ) -> Result<Envelope, StoreError> {
        self.inner.enqueue(payload, priority, record).await
    }

    async fn requeue(&self, envelope: Envelope) -> Result<(), StoreError> {
        self.inner.requeue(envelope).await
    }

    async fn dequeue(&self, kind: JobKind) -> Result<Option<Envelope>, StoreError> {
        self.check(kind)?;
        self.inner.dequeue(kind).await
    }

    async fn queue_len(&self, kind: JobKind) -> Result<usize, StoreError> {
        self.check(kind)?;
        self.inner.queue_len(kind).await
    }

    async fn depths(&self) -> Result<FxHashMap<JobKind, usize>, StoreError> {
        self.inner.depths().await
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        self.inner.ping().await
    }

    async fn clear(&self, kind: JobKind) -> Result<usize, StoreError> {
        self.check(kind)?;
        self.inner.clear(kind).await
    }
}
