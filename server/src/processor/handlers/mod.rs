//! Job handlers, one per queue kind.
//!
//! A handler turns a decoded payload into exactly one externally-visible
//! effect category. All handlers must be idempotent under at-least-once
//! delivery: a timed-out execution may have landed its effect anyway.

mod extraction;
mod search_index;
mod storage_sync;

pub use extraction::ExtractionHandler;
pub use search_index::SearchIndexHandler;
pub use storage_sync::StorageSyncHandler;

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::job::{Envelope, JobKind, JobPayload};
use crate::providers::ProviderError;
use crate::record::RecordError;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("payload does not match handler kind")]
    PayloadMismatch,
    #[error("referenced file {0} not found in system of record")]
    MissingFile(Uuid),
}

/// A job the handler wants enqueued after its own success.
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub payload: JobPayload,
    pub priority: i32,
}

/// Successful handler result: explicit follow-up enqueues plus any
/// sub-operations that degraded without failing the job.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    pub follow_ups: Vec<FollowUp>,
    pub degraded: Vec<String>,
}

impl HandlerOutput {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_follow_up(mut self, payload: JobPayload, priority: i32) -> Self {
        self.follow_ups.push(FollowUp { payload, priority });
        self
    }

    pub fn with_degraded(mut self, issue: impl Into<String>) -> Self {
        self.degraded.push(issue.into());
        self
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn execute(&self, envelope: &Envelope) -> Result<HandlerOutput, HandlerError>;
}

/// Kind-to-handler lookup table, built once at the composition root.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own kind. The last registration for a
    /// kind wins.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    #[inline]
    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).map(Arc::clone)
    }

    #[inline]
    pub fn contains(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
