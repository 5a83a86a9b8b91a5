//! Composite health verdict.
//!
//! A pure function of the dispatcher state, the store probe, queue depth
//! and the failure ratio. The verdict always ships with the list of issues
//! that justified it.

use serde::Serialize;

use crate::config::ProcessorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthVerdict {
    #[inline]
    fn rank(self) -> u8 {
        match self {
            HealthVerdict::Healthy => 0,
            HealthVerdict::Degraded => 1,
            HealthVerdict::Unhealthy => 2,
        }
    }

    #[inline]
    fn worst(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub verdict: HealthVerdict,
    pub issues: Vec<String>,
}

/// `ping_ms` is `None` when the backing store probe failed.
pub fn assess(
    dispatcher_running: bool,
    ping_ms: Option<u64>,
    aggregate_depth: usize,
    failure_ratio: f64,
    total_processed: u64,
    config: &ProcessorConfig,
) -> HealthReport {
    let mut verdict = HealthVerdict::Healthy;
    let mut issues = Vec::new();

    if ping_ms.is_none() {
        verdict = verdict.worst(HealthVerdict::Unhealthy);
        issues.push("queue store unreachable (ping failed)".to_string());
    }

    if aggregate_depth >= config.depth_critical {
        verdict = verdict.worst(HealthVerdict::Degraded);
        issues.push(format!(
            "aggregate queue depth {} exceeds critical threshold {}",
            aggregate_depth, config.depth_critical
        ));
    } else if aggregate_depth >= config.depth_warning {
        // Warning band: surfaced but not yet a degradation.
        issues.push(format!(
            "aggregate queue depth {} exceeds warning threshold {}",
            aggregate_depth, config.depth_warning
        ));
    }

    if total_processed > 0 && failure_ratio > config.failure_ratio_threshold {
        verdict = verdict.worst(HealthVerdict::Degraded);
        issues.push(format!(
            "failure ratio {:.1}% exceeds {:.1}% threshold",
            failure_ratio * 100.0,
            config.failure_ratio_threshold * 100.0
        ));
    }

    if !dispatcher_running {
        verdict = verdict.worst(HealthVerdict::Degraded);
        issues.push("dispatcher is not running".to_string());
    }

    HealthReport { verdict, issues }
}
