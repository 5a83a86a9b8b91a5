//! Search indexing handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{HandlerError, HandlerOutput, JobHandler};
use crate::job::{now_ms, Envelope, IndexAction, JobKind, JobPayload};
use crate::providers::{SearchDocument, SearchIndex};
use crate::record::SystemOfRecord;

/// Builds a document projection (title, extracted text, tags, metadata) and
/// upserts it into the search index, or deletes the entry. Upserts are
/// keyed by file id, so replaying a job yields one indexed document.
pub struct SearchIndexHandler {
    index: Arc<dyn SearchIndex>,
    record: Arc<dyn SystemOfRecord>,
}

impl SearchIndexHandler {
    pub fn new(index: Arc<dyn SearchIndex>, record: Arc<dyn SystemOfRecord>) -> Self {
        Self { index, record }
    }
}

#[async_trait]
impl JobHandler for SearchIndexHandler {
    fn kind(&self) -> JobKind {
        JobKind::SearchIndexing
    }

    async fn execute(&self, envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        let (file_id, action) = match &envelope.payload {
            JobPayload::SearchIndexing { file_id, action } => (*file_id, *action),
            _ => return Err(HandlerError::PayloadMismatch),
        };

        match action {
            IndexAction::Delete => {
                self.index.delete(file_id).await?;
                debug!(%file_id, "search entry deleted");
                Ok(HandlerOutput::done())
            }
            IndexAction::Upsert => {
                let meta = self
                    .record
                    .document_meta(file_id)
                    .await?
                    .ok_or(HandlerError::MissingFile(file_id))?;
                let text = self.record.extracted_text(file_id).await?;

                let mut output = HandlerOutput::done();
                if text.is_none() {
                    output = output
                        .with_degraded("extracted text not yet available; indexed metadata only");
                }

                let doc = SearchDocument {
                    file_id,
                    org_id: meta.org_id,
                    title: meta.title,
                    text,
                    tags: meta.tags,
                    mime_type: meta.mime_type,
                    updated_at: now_ms(),
                };
                self.index.upsert(&doc).await?;
                debug!(%file_id, "search entry upserted");
                Ok(output)
            }
        }
    }
}
