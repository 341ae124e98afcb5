//! Typed repository trait over the relational store.
//!
//! The pipeline never issues ad-hoc queries; every read and write goes
//! through these operations so the storage engine stays swappable.

use crate::error::PlatenResult;
use crate::pipeline::Stage;
use crate::types::{
    Chunk, ChunkOutcome, Document, EmbeddingRecord, ErrorCode, ImageItem, OemRelationship,
    ProcessingStatus, StageState, StageStatus, TableItem,
};

/// Outcome of an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Row existed and the candidate did not improve on it.
    Unchanged,
}

/// Typed storage operations consumed by the pipeline.
pub trait Repository: Send + Sync {
    // Documents
    fn get_document(&self, document_id: &str) -> PlatenResult<Option<Document>>;
    /// Look up a document by the hash of its raw bytes; the document-level
    /// dedup check at upload.
    fn find_document_by_hash(&self, content_hash: &str) -> PlatenResult<Option<Document>>;
    fn upsert_document(&self, document: &Document) -> PlatenResult<()>;
    fn set_processing_status(
        &self,
        document_id: &str,
        status: ProcessingStatus,
    ) -> PlatenResult<()>;

    // Chunks
    fn list_chunks_by_document(&self, document_id: &str) -> PlatenResult<Vec<Chunk>>;
    fn find_chunk_by_fingerprint(
        &self,
        document_id: &str,
        fingerprint: &str,
    ) -> PlatenResult<Option<Chunk>>;
    /// Insert a chunk unless an identical fingerprint already exists for
    /// the document, in which case the existing id is returned.
    fn upsert_chunk(&self, chunk: &Chunk) -> PlatenResult<ChunkOutcome>;
    fn link_chunks(&self, chunk_id: &str, prev: Option<&str>, next: Option<&str>)
        -> PlatenResult<()>;

    // Embeddings
    /// Idempotent upsert keyed by (source_id, source_type, model_name).
    fn upsert_embedding(&self, record: &EmbeddingRecord) -> PlatenResult<UpsertOutcome>;
    fn count_embeddings(&self, document_id: &str) -> PlatenResult<usize>;

    // Media
    fn list_images_by_document(&self, document_id: &str) -> PlatenResult<Vec<ImageItem>>;
    fn upsert_image(&self, image: &ImageItem) -> PlatenResult<UpsertOutcome>;
    fn list_tables_by_document(&self, document_id: &str) -> PlatenResult<Vec<TableItem>>;
    fn upsert_table(&self, table: &TableItem) -> PlatenResult<UpsertOutcome>;

    // Error codes
    /// Upsert under the (code, manufacturer, product, document, video)
    /// uniqueness scope. An existing row is updated only when the
    /// candidate's confidence is higher.
    fn upsert_error_code(&self, code: &ErrorCode) -> PlatenResult<UpsertOutcome>;
    /// Replace an existing code's part links and same-page image link
    /// without touching its confidence-gated fields.
    fn link_error_code(
        &self,
        error_code_id: &str,
        parts: &[String],
        image_id: Option<&str>,
    ) -> PlatenResult<()>;
    /// Tag every code of a document with an OEM manufacturer, returning
    /// how many rows changed.
    fn tag_error_codes_oem(&self, document_id: &str, oem: &str) -> PlatenResult<usize>;
    fn list_error_codes_by_document(&self, document_id: &str) -> PlatenResult<Vec<ErrorCode>>;
    fn list_error_codes_by_manufacturer(&self, manufacturer: &str) -> PlatenResult<Vec<ErrorCode>>;

    // OEM relationships
    fn list_oem_relationships(&self) -> PlatenResult<Vec<OemRelationship>>;
    fn upsert_oem_relationship(&self, rel: &OemRelationship) -> PlatenResult<()>;

    // Stage state. Single-row upserts; the only coordination point
    // between concurrent documents.
    fn get_stage_status(&self, document_id: &str, stage: Stage) -> PlatenResult<Option<StageState>>;
    fn set_stage_status(
        &self,
        document_id: &str,
        stage: Stage,
        status: StageStatus,
        error: Option<&str>,
    ) -> PlatenResult<()>;
    fn get_all_stage_status(&self, document_id: &str) -> PlatenResult<Vec<StageState>>;
}
