//! Queue store adapter.
//!
//! The store is the single shared mutable resource of the processing core:
//! enqueue, priority-ordered dequeue, depth inspection and a liveness probe
//! all go through its atomic primitives. Entries here are ephemeral; the
//! system of record holds the durable terminal state.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::job::{Envelope, JobKind, JobPayload, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("queue store unavailable: {0}")]
    Unavailable(String),
    #[error("queue store rejected the operation: {0}")]
    Rejected(String),
}

/// Ordered queue storage, one independent ordering domain per [`JobKind`].
///
/// Implementations must guarantee that `dequeue` is atomic: two concurrent
/// callers never receive the same envelope. Callers treat every method as
/// fallible I/O and degrade (skip the kind for the current tick) instead of
/// crashing on a [`StoreError`].
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Create an envelope for `payload` and insert it, ordered by priority
    /// then insertion sequence. `record` links jobs that originated in the
    /// system of record.
    async fn enqueue(
        &self,
        payload: JobPayload,
        priority: i32,
        record: Option<Uuid>,
    ) -> Result<Envelope, StoreError>;

    /// Re-insert an existing envelope (retry path). Keeps id and priority,
    /// assigns a fresh insertion sequence.
    async fn requeue(&self, envelope: Envelope) -> Result<(), StoreError>;

    /// Atomically remove and return the highest-priority, earliest envelope
    /// for `kind`.
    async fn dequeue(&self, kind: JobKind) -> Result<Option<Envelope>, StoreError>;

    /// Approximate current depth for one kind.
    async fn queue_len(&self, kind: JobKind) -> Result<usize, StoreError>;

    /// Approximate depth of every kind.
    async fn depths(&self) -> Result<FxHashMap<JobKind, usize>, StoreError>;

    /// Liveness/latency probe of the backing store.
    async fn ping(&self) -> Result<Duration, StoreError>;

    /// Drop every queued envelope for `kind`, returning how many were removed.
    async fn clear(&self, kind: JobKind) -> Result<usize, StoreError>;
}

/// In-process store: one lock-guarded binary heap per kind plus a global
/// insertion-sequence counter.
pub struct MemoryStore {
    shards: FxHashMap<JobKind, RwLock<BinaryHeap<Envelope>>>,
    seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut shards =
            FxHashMap::with_capacity_and_hasher(JobKind::ALL.len(), Default::default());
        for kind in JobKind::ALL {
            shards.insert(kind, RwLock::new(BinaryHeap::new()));
        }
        Self {
            shards,
            seq: AtomicU64::new(1),
        }
    }

    #[inline]
    fn shard(&self, kind: JobKind) -> &RwLock<BinaryHeap<Envelope>> {
        // The map is built over JobKind::ALL and never mutated afterwards.
        &self.shards[&kind]
    }

    #[inline]
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn enqueue(
        &self,
        payload: JobPayload,
        priority: i32,
        record: Option<Uuid>,
    ) -> Result<Envelope, StoreError> {
        let kind = payload.kind();
        let mut envelope = Envelope::new(payload, priority, record);
        envelope.seq = self.next_seq();
        self.shard(kind).write().push(envelope.clone());
        Ok(envelope)
    }

    async fn requeue(&self, mut envelope: Envelope) -> Result<(), StoreError> {
        envelope.seq = self.next_seq();
        envelope.status = JobStatus::Pending;
        envelope.started_at = 0;
        let kind = envelope.kind();
        self.shard(kind).write().push(envelope);
        Ok(())
    }

    async fn dequeue(&self, kind: JobKind) -> Result<Option<Envelope>, StoreError> {
        Ok(self.shard(kind).write().pop())
    }

    async fn queue_len(&self, kind: JobKind) -> Result<usize, StoreError> {
        Ok(self.shard(kind).read().len())
    }

    async fn depths(&self) -> Result<FxHashMap<JobKind, usize>, StoreError> {
        let mut out = FxHashMap::with_capacity_and_hasher(JobKind::ALL.len(), Default::default());
        for kind in JobKind::ALL {
            out.insert(kind, self.shard(kind).read().len());
        }
        Ok(out)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        for kind in JobKind::ALL {
            let _ = self.shard(kind).read().len();
        }
        Ok(start.elapsed())
    }

    async fn clear(&self, kind: JobKind) -> Result<usize, StoreError> {
        let mut shard = self.shard(kind).write();
        let removed = shard.len();
        shard.clear();
        Ok(removed)
    }
}
