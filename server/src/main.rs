mod config;
mod http;
mod job;
mod processor;
mod providers;
mod record;
mod store;
mod telemetry;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use config::ProcessorConfig;
use processor::handlers::{
    ExtractionHandler, HandlerRegistry, SearchIndexHandler, StorageSyncHandler,
};
use processor::JobProcessor;
use providers::{HttpExtractor, HttpReplicator, HttpSearchIndex};
use record::{MemRecord, PgRecord, SystemOfRecord};
use store::{MemoryStore, QueueStore};

const DEFAULT_ADMIN_PORT: u16 = 7390;

fn env_url(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let config = ProcessorConfig::from_env();
    let store: Arc<dyn QueueStore> = Arc::new(MemoryStore::new());

    let record: Arc<dyn SystemOfRecord> = match std::env::var("DATABASE_URL") {
        Ok(url) => match PgRecord::connect(&url).await {
            Ok(pg) => {
                if let Err(e) = pg.migrate().await {
                    error!(error = %e, "failed to run migrations");
                }
                info!("system of record: PostgreSQL");
                Arc::new(pg)
            }
            Err(e) => {
                error!(
                    error = %e,
                    "failed to connect to PostgreSQL, falling back to in-memory system of record"
                );
                Arc::new(MemRecord::new())
            }
        },
        Err(_) => {
            warn!("DATABASE_URL not set; terminal job status will not survive restarts");
            Arc::new(MemRecord::new())
        }
    };

    let client = providers::http_client();
    let extractor = Arc::new(HttpExtractor::new(
        client.clone(),
        env_url("EXTRACTOR_URL", "http://127.0.0.1:7401"),
    ));
    let replicator = Arc::new(HttpReplicator::new(
        client.clone(),
        env_url("STORAGE_SYNC_URL", "http://127.0.0.1:7402"),
    ));
    let search = Arc::new(HttpSearchIndex::new(
        client,
        env_url("SEARCH_INDEX_URL", "http://127.0.0.1:7403"),
    ));

    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(ExtractionHandler::new(
        extractor,
        Arc::clone(&record),
    )));
    handlers.register(Arc::new(StorageSyncHandler::new(replicator)));
    handlers.register(Arc::new(SearchIndexHandler::new(
        search,
        Arc::clone(&record),
    )));

    let processor = JobProcessor::new(store, record, handlers, config);

    // Pick up durable jobs that were pending when the previous process died.
    match processor.resync().await {
        Ok(count) if count > 0 => info!(count, "resynced jobs from system of record"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "startup resync failed"),
    }

    processor.start();

    let port = std::env::var("ADMIN_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_ADMIN_PORT);
    let router = http::create_router(Arc::clone(&processor));
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!(port, "admin API listening");
    axum::serve(listener, router).await?;

    Ok(())
}
