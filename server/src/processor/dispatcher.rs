//! Batch dispatcher.
//!
//! A fixed-interval scheduler loop pulls bounded batches from each queue
//! kind, flattens them and executes them under a global concurrency cap with
//! a per-job timeout. Failures are routed to the retry policy; no single
//! job's outcome can abort its siblings or the tick.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::handlers::HandlerOutput;
use super::JobProcessor;
use crate::config::ProcessorConfig;
use crate::job::{now_ms, Envelope, JobKind, JobStatus};

impl JobProcessor {
    pub(super) async fn dispatch_loop(self: Arc<Self>, config: ProcessorConfig) {
        info!(
            tick_interval_ms = config.tick_interval_ms,
            batch_size = config.batch_size,
            max_concurrent_jobs = config.max_concurrent_jobs,
            job_timeout_ms = config.job_timeout_ms,
            "dispatcher started"
        );

        let config = Arc::new(config);
        let mut ticker = interval(config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            // Back-pressure: if the previous tick is still executing, this
            // tick does nothing new instead of stacking work.
            if self.tick_busy.swap(true, Ordering::SeqCst) {
                self.metrics.record_tick_skipped();
                debug!("previous tick still in flight; skipping");
                continue;
            }
            let processor = Arc::clone(&self);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                processor.run_tick(&config).await;
                processor.tick_busy.store(false, Ordering::SeqCst);
            });
        }

        self.running.store(false, Ordering::SeqCst);
        info!("dispatcher stopped");
    }

    /// One dispatch pass: fetch per-kind batches, then execute the flattened
    /// batch under the concurrency cap.
    pub(crate) async fn run_tick(self: &Arc<Self>, config: &ProcessorConfig) {
        self.metrics.record_tick();

        let mut batch: Vec<Envelope> = Vec::new();
        for kind in JobKind::ALL {
            if !self.handlers.contains(kind) {
                // Configuration error: refuse to fetch so the jobs stay in
                // the store for manual inspection.
                match self.store.queue_len(kind).await {
                    Ok(depth) if depth > 0 => {
                        warn!(kind = %kind, depth, "no handler registered; jobs left in queue store");
                    }
                    _ => {}
                }
                continue;
            }
            for _ in 0..config.batch_size {
                match self.store.dequeue(kind).await {
                    Ok(Some(envelope)) => batch.push(envelope),
                    Ok(None) => break,
                    Err(e) => {
                        // Store trouble degrades this kind for this tick only.
                        warn!(kind = %kind, error = %e, "queue fetch failed; skipping kind for this tick");
                        break;
                    }
                }
            }
        }

        if batch.is_empty() {
            return;
        }
        debug!(jobs = batch.len(), "dispatching batch");

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let job_timeout = config.job_timeout();
        let mut handles = Vec::with_capacity(batch.len());

        for envelope in batch {
            // Acquire before spawning so slots are granted in arrival order.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let processor = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                processor.execute_one(envelope, job_timeout).await;
                drop(permit);
            }));
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                // A panicking handler loses its job but not its siblings.
                self.metrics.record_failure();
                error!(error = %e, "job task panicked");
            }
        }
    }

    async fn execute_one(self: &Arc<Self>, mut envelope: Envelope, job_timeout: Duration) {
        let kind = envelope.kind();
        let handler = match self.handlers.get(kind) {
            Some(handler) => handler,
            None => {
                // Registry changed between fetch and execution; put it back.
                warn!(job_id = envelope.id, kind = %kind, "no handler registered at execution time");
                if let Err(e) = self.store.requeue(envelope).await {
                    error!(error = %e, "failed to return job to queue store");
                }
                return;
            }
        };

        envelope.status = JobStatus::Processing;
        envelope.started_at = now_ms();
        if let Some(record) = envelope.record {
            if let Err(e) = self.record.mark_processing(record).await {
                warn!(job_id = envelope.id, error = %e, "failed to mark job processing in system of record");
            }
        }

        let started = Instant::now();
        match tokio::time::timeout(job_timeout, handler.execute(&envelope)).await {
            Ok(Ok(output)) => {
                self.finish_success(envelope, output, started.elapsed())
                    .await;
            }
            Ok(Err(e)) => {
                debug!(job_id = envelope.id, kind = %kind, error = %e, "job failed");
                self.metrics.record_failure();
                self.route_failure(envelope, e.to_string(), false).await;
            }
            Err(_) => {
                // The handler future is dropped but any downstream request
                // already in flight may still land; idempotent handlers
                // absorb the duplicate effect. Known limitation.
                self.metrics.record_timeout();
                warn!(
                    job_id = envelope.id,
                    kind = %kind,
                    timeout_ms = job_timeout.as_millis() as u64,
                    "job timed out; abandoning execution"
                );
                let reason = format!("timed out after {}ms", job_timeout.as_millis());
                self.route_failure(envelope, reason, true).await;
            }
        }
    }

    async fn finish_success(
        &self,
        mut envelope: Envelope,
        output: HandlerOutput,
        elapsed: Duration,
    ) {
        envelope.status = JobStatus::Completed;
        envelope.completed_at = now_ms();
        self.metrics.record_success(elapsed.as_millis() as u64);

        if !output.degraded.is_empty() {
            self.metrics.record_degraded();
            warn!(
                job_id = envelope.id,
                kind = %envelope.kind(),
                degraded = ?output.degraded,
                "job completed with degraded sub-operations"
            );
        }

        if let Some(record) = envelope.record {
            if let Err(e) = self.record.mark_completed(record).await {
                warn!(job_id = envelope.id, error = %e, "failed to mark job completed in system of record");
            }
        }

        for follow_up in output.follow_ups {
            match self
                .store
                .enqueue(follow_up.payload, follow_up.priority, None)
                .await
            {
                Ok(scheduled) => {
                    self.metrics.record_enqueued();
                    info!(
                        job_id = envelope.id,
                        follow_up_id = scheduled.id,
                        follow_up_kind = %scheduled.kind(),
                        priority = scheduled.priority,
                        "scheduled follow-up job"
                    );
                }
                Err(e) => {
                    error!(job_id = envelope.id, error = %e, "failed to enqueue follow-up job");
                }
            }
        }

        debug!(
            job_id = envelope.id,
            kind = %envelope.kind(),
            elapsed_ms = elapsed.as_millis() as u64,
            "job completed"
        );
    }
}
