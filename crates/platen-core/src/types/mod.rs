//! Core data model for the ingestion pipeline.

mod chunk;
mod document;
mod embedding;
mod error_code;
mod media;
mod oem;

pub use chunk::{label_for, Chunk, ChunkOutcome, PageLabel};
pub use document::{Document, ProcessingStatus, StageState, StageStatus};
pub use embedding::{EmbeddingRecord, SourceType};
pub use error_code::{ErrorCode, ExtractionMethod};
pub use media::{BoundingBox, ImageItem, MediaContext, TableItem};
pub use oem::{OemRelationType, OemRelationship};
