//! Multi-modal embedding generation.
//!
//! Produces one or more vectors per content unit and persists them through
//! the polymorphic embedding store. Batches are grouped per document with
//! bounded concurrency; one failed item never aborts the batch.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::{PlatenError, PlatenResult};
use crate::traits::{BlobStore, Embedder, Repository, VisualEmbedder};
use crate::types::{Chunk, EmbeddingRecord, ImageItem, SourceType, TableItem};

/// Outcome counts for one embedding batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Items structurally not embeddable yet (e.g. vector graphic with no
    /// raster derivative). Not failures.
    pub skipped: usize,
    /// (item id, error message) per failed item.
    pub errors: Vec<(String, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// Human-readable "9 succeeded / 1 failed" summary.
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded / {} failed / {} skipped",
            self.succeeded, self.failed, self.skipped
        )
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }

    fn absorb(&mut self, item_id: &str, result: PlatenResult<ItemOutcome>) {
        match result {
            Ok(ItemOutcome::Embedded) => self.succeeded += 1,
            Ok(ItemOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                warn!(item_id, error = %e, "embedding item failed");
                self.failed += 1;
                self.errors.push((item_id.to_string(), e.to_string()));
            }
        }
    }
}

enum ItemOutcome {
    Embedded,
    Skipped,
}

/// Generates and persists embeddings across modalities.
pub struct MultiModalEmbedder {
    text: Arc<dyn Embedder>,
    visual: Option<Arc<dyn VisualEmbedder>>,
    repository: Arc<dyn Repository>,
    blob_store: Arc<dyn BlobStore>,
    concurrency: usize,
}

impl MultiModalEmbedder {
    pub fn new(
        text: Arc<dyn Embedder>,
        visual: Option<Arc<dyn VisualEmbedder>>,
        repository: Arc<dyn Repository>,
        blob_store: Arc<dyn BlobStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            text,
            visual,
            repository,
            blob_store,
            concurrency: concurrency.max(1),
        }
    }

    /// Embed chunk text. One "text" vector per chunk, keyed to the chunk
    /// id so out-of-order completion is harmless.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> BatchReport {
        let mut report = BatchReport::default();
        let results = stream::iter(chunks.iter())
            .map(|chunk| async move {
                let outcome = self.embed_one_chunk(chunk).await;
                (chunk.id.clone(), outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        for (id, result) in results {
            report.absorb(&id, result);
        }
        debug!(summary = %report.summary(), "chunk embedding batch done");
        report
    }

    async fn embed_one_chunk(&self, chunk: &Chunk) -> PlatenResult<ItemOutcome> {
        let vector = self.text.embed(&chunk.text).await?;
        let record = EmbeddingRecord::new(
            &chunk.id,
            SourceType::Text,
            &chunk.document_id,
            vector,
            self.text.model_name(),
        )
        .with_context_text(&chunk.text);
        self.repository.upsert_embedding(&record)?;
        Ok(ItemOutcome::Embedded)
    }

    /// Embed images: a visual vector from pixel content plus a context
    /// vector from caption and surrounding prose when present. The context
    /// vector is what lets a free-text question retrieve a diagram with no
    /// visible text.
    pub async fn embed_images(&self, images: &[ImageItem]) -> BatchReport {
        let mut report = BatchReport::default();
        let results = stream::iter(images.iter())
            .map(|image| async move {
                let outcome = self.embed_one_image(image).await;
                (image.id.clone(), outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        for (id, result) in results {
            report.absorb(&id, result);
        }
        debug!(summary = %report.summary(), "image embedding batch done");
        report
    }

    async fn embed_one_image(&self, image: &ImageItem) -> PlatenResult<ItemOutcome> {
        let Some(visual) = &self.visual else {
            return Ok(ItemOutcome::Skipped);
        };
        // Vector graphics without a raster derivative are skipped, not
        // failed; the raster stage may still produce one later.
        let Some(url) = image.embeddable_url() else {
            debug!(image_id = %image.id, "vector graphic has no raster derivative; skipping");
            return Ok(ItemOutcome::Skipped);
        };

        let bytes = self.blob_store.get(url).await?;
        let vector = visual.embed_image(&bytes).await?;
        let record = EmbeddingRecord::new(
            &image.id,
            SourceType::Image,
            &image.document_id,
            vector,
            visual.model_name(),
        );
        self.repository.upsert_embedding(&record)?;

        if let Some(context_text) = image.context.embedding_text() {
            let vector = self.text.embed(&context_text).await?;
            let record = EmbeddingRecord::new(
                &image.id,
                SourceType::Context,
                &image.document_id,
                vector,
                self.text.model_name(),
            )
            .with_context_text(context_text);
            self.repository.upsert_embedding(&record)?;
        }
        Ok(ItemOutcome::Embedded)
    }

    /// Embed tables: a "table" vector over the flattened markdown rendering
    /// plus a context vector from caption/surrounding prose.
    pub async fn embed_tables(&self, tables: &[TableItem]) -> BatchReport {
        let mut report = BatchReport::default();
        let results = stream::iter(tables.iter())
            .map(|table| async move {
                let outcome = self.embed_one_table(table).await;
                (table.id.clone(), outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        for (id, result) in results {
            report.absorb(&id, result);
        }
        debug!(summary = %report.summary(), "table embedding batch done");
        report
    }

    async fn embed_one_table(&self, table: &TableItem) -> PlatenResult<ItemOutcome> {
        let flattened = table.to_markdown();
        if flattened.trim().is_empty() {
            return Err(PlatenError::validation("table has no cells"));
        }
        let vector = self.text.embed(&flattened).await?;
        let record = EmbeddingRecord::new(
            &table.id,
            SourceType::Table,
            &table.document_id,
            vector,
            self.text.model_name(),
        )
        .with_context_text(&flattened);
        self.repository.upsert_embedding(&record)?;

        if let Some(context_text) = table.context.embedding_text() {
            let vector = self.text.embed(&context_text).await?;
            let record = EmbeddingRecord::new(
                &table.id,
                SourceType::Context,
                &table.document_id,
                vector,
                self.text.model_name(),
            )
            .with_context_text(context_text);
            self.repository.upsert_embedding(&record)?;
        }
        Ok(ItemOutcome::Embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let report = BatchReport {
            succeeded: 9,
            failed: 1,
            skipped: 0,
            errors: vec![("img9".into(), "backend down".into())],
        };
        assert_eq!(report.summary(), "9 succeeded / 1 failed / 0 skipped");
        assert_eq!(report.total(), 10);
    }

    #[test]
    fn test_report_merge() {
        let mut a = BatchReport {
            succeeded: 2,
            ..Default::default()
        };
        a.merge(BatchReport {
            succeeded: 1,
            failed: 1,
            skipped: 3,
            errors: vec![("x".into(), "y".into())],
        });
        assert_eq!(a.succeeded, 3);
        assert_eq!(a.failed, 1);
        assert_eq!(a.skipped, 3);
        assert_eq!(a.errors.len(), 1);
    }
}
