//! Health verdict tests.

use super::*;
use crate::processor::health::assess;
use crate::processor::HealthVerdict;

#[test]
fn unreachable_store_is_unhealthy() {
    let config = test_config();
    let report = assess(true, None, 0, 0.0, 0, &config);
    assert_eq!(report.verdict, HealthVerdict::Unhealthy);
    assert!(report.issues.iter().any(|i| i.contains("unreachable")));
}

#[test]
fn critical_depth_with_reachable_store_is_degraded() {
    let config = test_config();
    let depth = config.depth_critical + 1;
    let report = assess(true, Some(1), depth, 0.0, 0, &config);
    assert_eq!(report.verdict, HealthVerdict::Degraded);
    assert!(report.issues.iter().any(|i| i.contains("critical")));
}

#[test]
fn warning_depth_is_reported_without_degrading() {
    let config = test_config();
    let depth = config.depth_warning + 1;
    let report = assess(true, Some(1), depth, 0.0, 0, &config);
    assert_eq!(report.verdict, HealthVerdict::Healthy);
    assert_eq!(report.issues.len(), 1);
}

#[test]
fn quiet_system_is_healthy_with_no_issues() {
    let config = test_config();
    let report = assess(true, Some(1), 0, 0.0, 0, &config);
    assert_eq!(report.verdict, HealthVerdict::Healthy);
    assert!(report.issues.is_empty());
}

#[test]
fn high_failure_ratio_degrades() {
    let config = test_config();
    let report = assess(true, Some(1), 0, 0.25, 100, &config);
    assert_eq!(report.verdict, HealthVerdict::Degraded);
    assert!(report.issues.iter().any(|i| i.contains("failure ratio")));
}

#[test]
fn failure_ratio_is_ignored_before_any_job_ran() {
    let config = test_config();
    let report = assess(true, Some(1), 0, 1.0, 0, &config);
    assert_eq!(report.verdict, HealthVerdict::Healthy);
}

#[test]
fn stopped_dispatcher_degrades() {
    let config = test_config();
    let report = assess(false, Some(1), 0, 0.0, 0, &config);
    assert_eq!(report.verdict, HealthVerdict::Degraded);
    assert!(report.issues.iter().any(|i| i.contains("not running")));
}

#[test]
fn ping_failure_dominates_other_issues() {
    let config = test_config();
    let report = assess(false, None, config.depth_critical + 1, 0.5, 10, &config);
    assert_eq!(report.verdict, HealthVerdict::Unhealthy);
    assert!(report.issues.len() >= 3, "every issue is still listed");
}

#[tokio::test]
async fn processor_health_reflects_live_state() {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(RecordingHandler::new(JobKind::Extraction)));
    let (processor, _store, _record) = setup(registry, test_config());

    let report = processor.health().await;
    assert_eq!(report.verdict, HealthVerdict::Degraded);
    assert!(report.issues.iter().any(|i| i.contains("not running")));

    processor.start();
    let report = processor.health().await;
    assert_eq!(report.verdict, HealthVerdict::Healthy);
    processor.stop();
}
