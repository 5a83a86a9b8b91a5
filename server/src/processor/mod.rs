//! Core JobProcessor struct and lifecycle.
//!
//! The actual behavior is implemented in separate modules:
//! - dispatcher.rs - tick loop, batch fetch and bounded execution
//! - retry.rs - backoff policy and failure routing
//! - handlers/ - one handler per job kind
//! - metrics.rs / health.rs - counters and the health verdict
//! - admin.rs - clear, bulk-retry and resync operations

pub mod handlers;

mod admin;
mod dispatcher;
mod health;
mod metrics;
mod retry;

#[cfg(test)]
mod tests;

pub use health::{HealthReport, HealthVerdict};
pub use metrics::{MetricsSnapshot, ProcessorMetrics};
pub use retry::RetryPolicy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigPatch, ProcessorConfig};
use crate::job::{Envelope, JobKind, JobPayload};
use crate::record::{RecordError, SystemOfRecord};
use crate::store::{QueueStore, StoreError};
use handlers::HandlerRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub queues: FxHashMap<JobKind, usize>,
    pub metrics: MetricsSnapshot,
    pub config: ProcessorConfig,
}

/// The dispatcher instance owned by the process's composition root.
///
/// One per process: a single-threaded scheduler loop fanning execution out
/// across a bounded pool of tasks. Start/stop are explicit methods; whoever
/// needs the administrative surface holds an `Arc` to this.
pub struct JobProcessor {
    store: Arc<dyn QueueStore>,
    record: Arc<dyn SystemOfRecord>,
    handlers: HandlerRegistry,
    config: RwLock<ProcessorConfig>,
    pub(crate) metrics: ProcessorMetrics,
    running: AtomicBool,
    shutdown: AtomicBool,
    tick_busy: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn QueueStore>,
        record: Arc<dyn SystemOfRecord>,
        handlers: HandlerRegistry,
        config: ProcessorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            record,
            handlers,
            config: RwLock::new(config),
            metrics: ProcessorMetrics::new(),
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            tick_busy: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
        })
    }

    /// Start the dispatcher loop with the current configuration.
    /// Returns false if it was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown.store(false, Ordering::SeqCst);
        let config = self.config.read().clone();
        let processor = Arc::clone(self);
        let handle = tokio::spawn(async move { processor.dispatch_loop(config).await });
        *self.loop_handle.lock() = Some(handle);
        true
    }

    /// Signal the dispatcher loop to exit at the next tick boundary.
    /// Jobs already dispatched keep running to completion.
    pub fn stop(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        info!("dispatcher stop requested");
        true
    }

    /// Stop, wait for the loop to exit, then start again. Picks up any
    /// configuration staged since the last start.
    pub async fn restart(self: &Arc<Self>) -> bool {
        self.stop();
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.start()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> ProcessorConfig {
        self.config.read().clone()
    }

    /// Stage a configuration update. Applied the next time the dispatcher
    /// starts; the running loop keeps its snapshot.
    pub fn update_config(&self, patch: &ConfigPatch) -> ProcessorConfig {
        let mut config = self.config.write();
        patch.apply(&mut config);
        info!(
            batch_size = config.batch_size,
            max_concurrent_jobs = config.max_concurrent_jobs,
            job_timeout_ms = config.job_timeout_ms,
            retry_delay_ms = config.retry_delay_ms,
            max_retries = config.max_retries,
            tick_interval_ms = config.tick_interval_ms,
            "configuration updated; applies on next start"
        );
        config.clone()
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        let config = self.config.read();
        RetryPolicy::new(config.max_retries, config.retry_delay())
    }

    /// Producer entry point: wrap a payload and insert it into the queue
    /// store. `record` links jobs that originated in the system of record.
    pub async fn enqueue(
        &self,
        payload: JobPayload,
        priority: i32,
        record: Option<Uuid>,
    ) -> Result<Envelope, ProcessorError> {
        let envelope = self.store.enqueue(payload, priority, record).await?;
        self.metrics.record_enqueued();
        Ok(envelope)
    }

    pub async fn queue_depths(&self) -> FxHashMap<JobKind, usize> {
        match self.store.depths().await {
            Ok(depths) => depths,
            Err(e) => {
                warn!(error = %e, "failed to read queue depths");
                FxHashMap::default()
            }
        }
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            running: self.is_running(),
            queues: self.queue_depths().await,
            metrics: self.metrics.snapshot(),
            config: self.config(),
        }
    }

    /// Composite health verdict with the issues that justified it.
    pub async fn health(&self) -> HealthReport {
        let config = self.config();
        let ping_ms = match self.store.ping().await {
            Ok(latency) => Some(latency.as_millis() as u64),
            Err(e) => {
                warn!(error = %e, "queue store ping failed");
                None
            }
        };
        let aggregate_depth = self.queue_depths().await.values().sum();
        health::assess(
            self.is_running(),
            ping_ms,
            aggregate_depth,
            self.metrics.failure_ratio(),
            self.metrics.total_processed(),
            &config,
        )
    }
}
