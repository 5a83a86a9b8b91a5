//! Text extraction handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{HandlerError, HandlerOutput, JobHandler};
use crate::job::{Envelope, IndexAction, JobKind, JobPayload};
use crate::providers::TextExtractor;
use crate::record::SystemOfRecord;

/// Triggers content extraction for a file, persists the extracted text to
/// the system of record and schedules a follow-up search-indexing job at a
/// lower priority, decoupling indexing latency from extraction latency.
pub struct ExtractionHandler {
    extractor: Arc<dyn TextExtractor>,
    record: Arc<dyn SystemOfRecord>,
}

impl ExtractionHandler {
    pub fn new(extractor: Arc<dyn TextExtractor>, record: Arc<dyn SystemOfRecord>) -> Self {
        Self { extractor, record }
    }
}

#[async_trait]
impl JobHandler for ExtractionHandler {
    fn kind(&self) -> JobKind {
        JobKind::Extraction
    }

    async fn execute(&self, envelope: &Envelope) -> Result<HandlerOutput, HandlerError> {
        let (file_id, org_id, method) = match &envelope.payload {
            JobPayload::Extraction {
                file_id,
                org_id,
                method,
            } => (*file_id, *org_id, *method),
            _ => return Err(HandlerError::PayloadMismatch),
        };

        let extracted = self.extractor.extract(file_id, org_id, method).await?;
        // Overwrite semantics keep re-runs after a timeout harmless.
        self.record
            .save_extracted_text(file_id, &extracted.text)
            .await?;

        debug!(
            %file_id,
            method = %extracted.method_used,
            chars = extracted.text.len(),
            pages = extracted.pages,
            "extracted text persisted"
        );

        Ok(HandlerOutput::done().with_follow_up(
            JobPayload::SearchIndexing {
                file_id,
                action: IndexAction::Upsert,
            },
            envelope.priority - 1,
        ))
    }
}
