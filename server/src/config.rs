//! Processor tunables.
//!
//! Loaded from the environment at startup; runtime updates are staged in the
//! processor and applied on the next dispatcher start.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessorConfig {
    /// Jobs pulled per queue kind per tick.
    pub batch_size: usize,
    /// Global cap on concurrently executing jobs.
    pub max_concurrent_jobs: usize,
    pub job_timeout_ms: u64,
    /// Base delay before the first retry; doubles per attempt.
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub tick_interval_ms: u64,
    /// Aggregate queue depth bands for the health verdict.
    pub depth_warning: usize,
    pub depth_critical: usize,
    /// Failure ratio above which the verdict degrades.
    pub failure_ratio_threshold: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent_jobs: 5,
            job_timeout_ms: 30_000,
            retry_delay_ms: 5_000,
            max_retries: 3,
            tick_interval_ms: 500,
            depth_warning: 500,
            depth_critical: 2_000,
            failure_ratio_threshold: 0.10,
        }
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_parse("BATCH_SIZE", defaults.batch_size),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs),
            job_timeout_ms: env_parse("JOB_TIMEOUT_MS", defaults.job_timeout_ms),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", defaults.retry_delay_ms),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            tick_interval_ms: env_parse("TICK_INTERVAL_MS", defaults.tick_interval_ms),
            depth_warning: env_parse("DEPTH_WARNING", defaults.depth_warning),
            depth_critical: env_parse("DEPTH_CRITICAL", defaults.depth_critical),
            failure_ratio_threshold: env_parse(
                "FAILURE_RATIO_THRESHOLD",
                defaults.failure_ratio_threshold,
            ),
        }
    }

    #[inline]
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    #[inline]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Partial update coming from the administrative surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub batch_size: Option<usize>,
    pub max_concurrent_jobs: Option<usize>,
    pub job_timeout_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub tick_interval_ms: Option<u64>,
    pub depth_warning: Option<usize>,
    pub depth_critical: Option<usize>,
    pub failure_ratio_threshold: Option<f64>,
}

impl ConfigPatch {
    pub fn apply(&self, config: &mut ProcessorConfig) {
        if let Some(v) = self.batch_size {
            config.batch_size = v.max(1);
        }
        if let Some(v) = self.max_concurrent_jobs {
            config.max_concurrent_jobs = v.max(1);
        }
        if let Some(v) = self.job_timeout_ms {
            config.job_timeout_ms = v;
        }
        if let Some(v) = self.retry_delay_ms {
            config.retry_delay_ms = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.tick_interval_ms {
            config.tick_interval_ms = v;
        }
        if let Some(v) = self.depth_warning {
            config.depth_warning = v;
        }
        if let Some(v) = self.depth_critical {
            config.depth_critical = v;
        }
        if let Some(v) = self.failure_ratio_threshold {
            config.failure_ratio_threshold = v;
        }
    }
}
