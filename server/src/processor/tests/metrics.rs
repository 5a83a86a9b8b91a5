//! Metrics bookkeeping tests.

use super::*;
use crate::processor::ProcessorMetrics;

#[test]
fn counters_accumulate() {
    let metrics = ProcessorMetrics::new();
    metrics.record_success(10);
    metrics.record_success(30);
    metrics.record_failure();
    metrics.record_timeout();
    metrics.record_retry_scheduled();
    metrics.record_permanent_failure();
    metrics.record_tick();
    metrics.record_tick_skipped();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.total_processed, 4);
    assert_eq!(snapshot.succeeded, 2);
    assert_eq!(snapshot.failed, 2);
    assert_eq!(snapshot.timed_out, 1);
    assert_eq!(snapshot.retries_scheduled, 1);
    assert_eq!(snapshot.permanently_failed, 1);
    assert_eq!(snapshot.ticks, 1);
    assert_eq!(snapshot.ticks_skipped, 1);
    assert!((snapshot.avg_latency_ms - 20.0).abs() < f64::EPSILON);
    assert!((snapshot.failure_ratio - 0.5).abs() < f64::EPSILON);
}

#[test]
fn fresh_metrics_report_zero_rates() {
    let metrics = ProcessorMetrics::new();
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.total_processed, 0);
    assert_eq!(snapshot.avg_latency_ms, 0.0);
    assert_eq!(snapshot.failure_ratio, 0.0);
    assert_eq!(snapshot.throughput_per_minute, 0.0);
}

#[tokio::test]
async fn status_report_includes_depths_and_config() {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(RecordingHandler::new(JobKind::Extraction)));
    let (processor, _store, _record) = setup(registry, test_config());

    processor
        .enqueue(extraction_payload(), 0, None)
        .await
        .unwrap();
    processor
        .enqueue(sync_payload(), 0, None)
        .await
        .unwrap();

    let status = processor.status().await;
    assert!(!status.running);
    assert_eq!(status.queues[&JobKind::Extraction], 1);
    assert_eq!(status.queues[&JobKind::StorageSync], 1);
    assert_eq!(status.metrics.enqueued, 2);
    assert_eq!(status.config.batch_size, test_config().batch_size);
}

#[tokio::test]
async fn config_patch_applies_on_update() {
    let registry = HandlerRegistry::new();
    let (processor, _store, _record) = setup(registry, test_config());

    let patch = crate::config::ConfigPatch {
        batch_size: Some(42),
        max_retries: Some(7),
        ..Default::default()
    };
    let updated = processor.update_config(&patch);
    assert_eq!(updated.batch_size, 42);
    assert_eq!(updated.max_retries, 7);
    // Untouched fields keep their values.
    assert_eq!(updated.retry_delay_ms, test_config().retry_delay_ms);
    assert_eq!(processor.config().batch_size, 42);
}
