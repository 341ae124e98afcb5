//! platen-embeddings - Embedding provider implementations for platen.
//!
//! Text and visual-document embedding backends for the ingestion
//! pipeline.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - text-embedding-3-small, text-embedding-3-large, etc.
//! - **Ollama** (feature: `ollama`) - Local embedding models via Ollama
//! - Visual-document models (colpali and similar) via any
//!   Ollama-compatible embeddings endpoint
//!
//! # Example
//!
//! ```ignore
//! use platen_embeddings::EmbedderFactory;
//! use platen_core::traits::EmbedderConfig;
//!
//! // Create an OpenAI text embedder
//! let embedder = EmbedderFactory::openai()?;
//!
//! // Or a local one
//! let embedder = EmbedderFactory::ollama_with_model("nomic-embed-text", 768)?;
//!
//! // And a visual embedder for diagrams and scanned pages
//! let visual = EmbedderFactory::create_visual(EmbedderConfig {
//!     model: "colpali".to_string(),
//!     embedding_dims: 768,
//!     ..Default::default()
//! })?;
//! ```

mod factory;
mod ollama;
mod openai;

pub use factory::EmbedderFactory;
pub use ollama::{OllamaEmbedder, OllamaVisualEmbedder};
pub use openai::OpenAIEmbedder;

// Re-export core types for convenience
pub use platen_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, VisualEmbedder};
