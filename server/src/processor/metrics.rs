//! Rolling processor counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

pub struct ProcessorMetrics {
    started: Instant,
    enqueued: AtomicU64,
    total_processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    degraded: AtomicU64,
    retries_scheduled: AtomicU64,
    permanently_failed: AtomicU64,
    ticks: AtomicU64,
    ticks_skipped: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            enqueued: AtomicU64::new(0),
            total_processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            degraded: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
            permanently_failed: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_success(&self, latency_ms: u64) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_failure(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Timeouts count as failures; the separate counter only adds detail.
    #[inline(always)]
    pub fn record_timeout(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_permanent_failure(&self) {
        self.permanently_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_tick_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    pub fn failure_ratio(&self) -> f64 {
        let processed = self.total_processed.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }
        self.failed.load(Ordering::Relaxed) as f64 / processed as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.total_processed.load(Ordering::Relaxed);
        let latency_count = self.latency_count.load(Ordering::Relaxed);
        let avg_latency_ms = if latency_count > 0 {
            self.latency_sum_ms.load(Ordering::Relaxed) as f64 / latency_count as f64
        } else {
            0.0
        };
        let uptime_seconds = self.started.elapsed().as_secs();
        // Clamp the window to one second so a fresh process reports a
        // finite rate instead of dividing by zero.
        let minutes = (uptime_seconds.max(1)) as f64 / 60.0;

        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            total_processed: processed,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            permanently_failed: self.permanently_failed.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            avg_latency_ms,
            failure_ratio: self.failure_ratio(),
            uptime_seconds,
            throughput_per_minute: processed as f64 / minutes,
        }
    }
}

impl Default for ProcessorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub total_processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub degraded: u64,
    pub retries_scheduled: u64,
    pub permanently_failed: u64,
    pub ticks: u64,
    pub ticks_skipped: u64,
    pub avg_latency_ms: f64,
    pub failure_ratio: f64,
    pub uptime_seconds: u64,
    pub throughput_per_minute: f64,
}
