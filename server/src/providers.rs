//! Downstream provider clients.
//!
//! Extraction, storage replication and search indexing are external services
//! consumed as black boxes: one asynchronous call per operation, returning
//! success or failure plus diagnostic metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::ExtractionMethod;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned an error: {0}")]
    Upstream(String),
}

/// Result of a text extraction call.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub method_used: ExtractionMethod,
    #[serde(default)]
    pub pages: Option<u32>,
}

/// Result of a storage reconciliation call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncReport {
    /// Whether the backup location had to be repaired.
    #[serde(default)]
    pub repaired: bool,
    /// Sub-operations that did not complete cleanly but were not fatal.
    #[serde(default)]
    pub degraded: Vec<String>,
}

/// Document projection pushed into the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub file_id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub updated_at: u64,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        file_id: Uuid,
        org_id: Uuid,
        method: ExtractionMethod,
    ) -> Result<ExtractedText, ProviderError>;
}

#[async_trait]
pub trait StorageReplicator: Send + Sync {
    /// Reconcile a file's primary and backup storage locations.
    async fn sync(&self, file_id: Uuid) -> Result<SyncReport, ProviderError>;
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), ProviderError>;
    async fn delete(&self, file_id: Uuid) -> Result<(), ProviderError>;
}

/// Shared HTTP client for all provider calls (connection reuse).
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ============== HTTP implementations ==============

pub struct HttpExtractor {
    client: reqwest::Client,
    base: String,
}

impl HttpExtractor {
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }
}

#[derive(Serialize)]
struct ExtractRequest {
    file_id: Uuid,
    org_id: Uuid,
    method: ExtractionMethod,
}

#[async_trait]
impl TextExtractor for HttpExtractor {
    async fn extract(
        &self,
        file_id: Uuid,
        org_id: Uuid,
        method: ExtractionMethod,
    ) -> Result<ExtractedText, ProviderError> {
        let response = self
            .client
            .post(format!("{}/extract", self.base))
            .json(&ExtractRequest {
                file_id,
                org_id,
                method,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!(
                "extractor responded {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }
}

pub struct HttpReplicator {
    client: reqwest::Client,
    base: String,
}

impl HttpReplicator {
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }
}

#[async_trait]
impl StorageReplicator for HttpReplicator {
    async fn sync(&self, file_id: Uuid) -> Result<SyncReport, ProviderError> {
        let response = self
            .client
            .post(format!("{}/sync/{}", self.base, file_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!(
                "storage service responded {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }
}

pub struct HttpSearchIndex {
    client: reqwest::Client,
    base: String,
}

impl HttpSearchIndex {
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), ProviderError> {
        let response = self
            .client
            .put(format!("{}/documents/{}", self.base, doc.file_id))
            .json(doc)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "search index responded {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete(&self, file_id: Uuid) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(format!("{}/documents/{}", self.base, file_id))
            .send()
            .await?;

        // Deleting an entry that was never indexed is not an error.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::Upstream(format!(
                "search index responded {}",
                response.status()
            )));
        }
        Ok(())
    }
}
