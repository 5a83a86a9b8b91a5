//! PostgreSQL system of record.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{DocumentMeta, PendingJob, RecordError, SystemOfRecord};
use crate::job::{now_ms, JobKind, JobPayload};

pub struct PgRecord {
    pool: PgPool,
}

impl PgRecord {
    pub async fn connect(database_url: &str) -> Result<Self, RecordError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the tables this core owns if they do not exist yet. The
    /// `files` table belongs to the surrounding application and is only
    /// read here.
    pub async fn migrate(&self) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS background_jobs (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                payload JSONB NOT NULL,
                priority INT NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                failure_reason TEXT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_background_jobs_kind_status \
             ON background_jobs (kind, status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS extracted_texts (
                file_id UUID PRIMARY KEY,
                content TEXT NOT NULL,
                updated_at BIGINT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn jobs_with_status(
        &self,
        kind: JobKind,
        status: &str,
        limit: usize,
    ) -> Result<Vec<PendingJob>, RecordError> {
        let rows = sqlx::query(
            "SELECT id, payload, priority FROM background_jobs \
             WHERE kind = $1 AND status = $2 \
             ORDER BY priority DESC, created_at ASC LIMIT $3",
        )
        .bind(kind.as_str())
        .bind(status)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            let payload: JobPayload = serde_json::from_value(payload)?;
            jobs.push(PendingJob {
                record: row.get("id"),
                payload,
                priority: row.get("priority"),
            });
        }
        Ok(jobs)
    }

    async fn set_status(
        &self,
        record: Uuid,
        status: &str,
        reason: Option<&str>,
    ) -> Result<(), RecordError> {
        sqlx::query(
            "UPDATE background_jobs SET status = $1, failure_reason = $2, updated_at = $3 \
             WHERE id = $4",
        )
        .bind(status)
        .bind(reason)
        .bind(now_ms() as i64)
        .bind(record)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SystemOfRecord for PgRecord {
    async fn pending_jobs(
        &self,
        kind: JobKind,
        limit: usize,
    ) -> Result<Vec<PendingJob>, RecordError> {
        self.jobs_with_status(kind, "pending", limit).await
    }

    async fn failed_jobs(
        &self,
        kind: JobKind,
        limit: usize,
    ) -> Result<Vec<PendingJob>, RecordError> {
        self.jobs_with_status(kind, "failed", limit).await
    }

    async fn mark_pending(&self, record: Uuid) -> Result<(), RecordError> {
        self.set_status(record, "pending", None).await
    }

    async fn mark_processing(&self, record: Uuid) -> Result<(), RecordError> {
        self.set_status(record, "processing", None).await
    }

    async fn mark_completed(&self, record: Uuid) -> Result<(), RecordError> {
        self.set_status(record, "completed", None).await
    }

    async fn mark_failed(&self, record: Uuid, reason: &str) -> Result<(), RecordError> {
        self.set_status(record, "failed", Some(reason)).await
    }

    async fn save_extracted_text(&self, file_id: Uuid, text: &str) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            INSERT INTO extracted_texts (file_id, content, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (file_id) DO UPDATE SET
                content = EXCLUDED.content,
                updated_at = EXCLUDED.updated_at
        "#,
        )
        .bind(file_id)
        .bind(text)
        .bind(now_ms() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn extracted_text(&self, file_id: Uuid) -> Result<Option<String>, RecordError> {
        let row = sqlx::query("SELECT content FROM extracted_texts WHERE file_id = $1")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("content")))
    }

    async fn document_meta(&self, file_id: Uuid) -> Result<Option<DocumentMeta>, RecordError> {
        let row = sqlx::query(
            "SELECT id, org_id, title, tags, mime_type FROM files WHERE id = $1",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DocumentMeta {
            file_id: r.get("id"),
            org_id: r.get("org_id"),
            title: r.get("title"),
            tags: r.get::<Option<Vec<String>>, _>("tags").unwrap_or_default(),
            mime_type: r.get("mime_type"),
        }))
    }
}
