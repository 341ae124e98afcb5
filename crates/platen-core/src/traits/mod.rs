//! Capability traits consumed by the pipeline.

mod blob_store;
mod embedder;
mod llm;
mod repository;

pub use blob_store::{BlobStore, Rasterizer};
pub use embedder::{Embedder, EmbedderConfig, EmbedderProvider, VisualEmbedder};
pub use llm::{Llm, LlmConfig};
pub use repository::{Repository, UpsertOutcome};
