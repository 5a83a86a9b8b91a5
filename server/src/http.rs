//! Administrative HTTP API.
//!
//! The processing core has no interactive caller; this surface exists for
//! operators and the surrounding application: dispatcher lifecycle, runtime
//! tunables, status/health inspection and queue maintenance actions.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::config::{ConfigPatch, ProcessorConfig};
use crate::job::{Envelope, JobKind, JobPayload};
use crate::processor::{HealthReport, JobProcessor, MetricsSnapshot, StatusReport};

pub type AppState = Arc<JobProcessor>;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Json<Self> {
        Json(Self {
            ok: true,
            data: Some(data),
            error: None,
        })
    }

    fn error(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        })
    }
}

/// Create CORS layer based on environment configuration.
/// Set CORS_ALLOW_ORIGIN (comma-separated origins) in production.
fn create_cors_layer() -> CorsLayer {
    match std::env::var("CORS_ALLOW_ORIGIN").ok() {
        Some(origins) if !origins.is_empty() && origins != "*" => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        }
        _ => CorsLayer::permissive(),
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = create_cors_layer();

    Router::new()
        // Dispatcher lifecycle
        .route("/dispatcher/start", post(start_dispatcher))
        .route("/dispatcher/stop", post(stop_dispatcher))
        .route("/dispatcher/restart", post(restart_dispatcher))
        .route("/dispatcher/config", put(update_config))
        // Inspection
        .route("/status", get(get_status))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        // Queue operations
        .route("/queues/{kind}/jobs", post(push_job))
        .route("/queues/{kind}/jobs", delete(clear_queue))
        .route("/queues/{kind}/retry-failed", post(retry_failed))
        .route("/resync", post(resync))
        .with_state(state)
        .layer(cors)
}

// === Dispatcher lifecycle ===

async fn start_dispatcher(State(processor): State<AppState>) -> Json<ApiResponse<&'static str>> {
    if processor.start() {
        ApiResponse::success("started")
    } else {
        ApiResponse::success("already running")
    }
}

async fn stop_dispatcher(State(processor): State<AppState>) -> Json<ApiResponse<&'static str>> {
    if processor.stop() {
        ApiResponse::success("stopping")
    } else {
        ApiResponse::success("not running")
    }
}

async fn restart_dispatcher(State(processor): State<AppState>) -> Json<ApiResponse<&'static str>> {
    processor.restart().await;
    ApiResponse::success("restarted")
}

async fn update_config(
    State(processor): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> Json<ApiResponse<ProcessorConfig>> {
    ApiResponse::success(processor.update_config(&patch))
}

// === Inspection ===

async fn get_status(State(processor): State<AppState>) -> Json<ApiResponse<StatusReport>> {
    ApiResponse::success(processor.status().await)
}

async fn get_health(State(processor): State<AppState>) -> Json<ApiResponse<HealthReport>> {
    ApiResponse::success(processor.health().await)
}

#[derive(Serialize)]
struct MetricsResponse {
    metrics: MetricsSnapshot,
    queues: FxHashMap<JobKind, usize>,
}

async fn get_metrics(State(processor): State<AppState>) -> Json<ApiResponse<MetricsResponse>> {
    ApiResponse::success(MetricsResponse {
        metrics: processor.metrics.snapshot(),
        queues: processor.queue_depths().await,
    })
}

// === Queue operations ===

#[derive(Deserialize)]
struct PushRequest {
    payload: JobPayload,
    #[serde(default)]
    priority: i32,
    /// System-of-record row to mirror terminal status into, if any.
    #[serde(default)]
    record: Option<Uuid>,
}

async fn push_job(
    State(processor): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<PushRequest>,
) -> Json<ApiResponse<Envelope>> {
    let kind = match JobKind::from_str(&kind) {
        Ok(kind) => kind,
        Err(e) => return ApiResponse::error(e),
    };
    if req.payload.kind() != kind {
        return ApiResponse::error(format!(
            "payload kind {} does not match queue {}",
            req.payload.kind(),
            kind
        ));
    }
    match processor
        .enqueue(req.payload, req.priority, req.record)
        .await
    {
        Ok(envelope) => ApiResponse::success(envelope),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

async fn clear_queue(
    State(processor): State<AppState>,
    Path(kind): Path<String>,
) -> Json<ApiResponse<usize>> {
    let kind = match JobKind::from_str(&kind) {
        Ok(kind) => kind,
        Err(e) => return ApiResponse::error(e),
    };
    match processor.clear_queue(kind).await {
        Ok(removed) => ApiResponse::success(removed),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

async fn retry_failed(
    State(processor): State<AppState>,
    Path(kind): Path<String>,
) -> Json<ApiResponse<usize>> {
    let kind = match JobKind::from_str(&kind) {
        Ok(kind) => kind,
        Err(e) => return ApiResponse::error(e),
    };
    match processor.retry_failed(kind).await {
        Ok(retried) => ApiResponse::success(retried),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

async fn resync(State(processor): State<AppState>) -> Json<ApiResponse<usize>> {
    match processor.resync().await {
        Ok(count) => ApiResponse::success(count),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}
