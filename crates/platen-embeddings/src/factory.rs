//! Factory for creating embedding providers.

use std::sync::Arc;

use platen_core::error::PlatenResult;
use platen_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, VisualEmbedder};

use crate::ollama::{OllamaEmbedder, OllamaVisualEmbedder};
use crate::openai::OpenAIEmbedder;

/// Factory for creating embedding providers.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Create a text embedder from the given configuration.
    pub fn create(
        provider: EmbedderProvider,
        config: EmbedderConfig,
    ) -> PlatenResult<Arc<dyn Embedder>> {
        match provider {
            EmbedderProvider::OpenAI => {
                let embedder = OpenAIEmbedder::new(config)?;
                Ok(Arc::new(embedder))
            }
            EmbedderProvider::Ollama => {
                let embedder = OllamaEmbedder::new(config)?;
                Ok(Arc::new(embedder))
            }
        }
    }

    /// Create a visual-document embedder. Only the Ollama-compatible
    /// endpoint serves visual models today, regardless of provider.
    pub fn create_visual(config: EmbedderConfig) -> PlatenResult<Arc<dyn VisualEmbedder>> {
        let embedder = OllamaVisualEmbedder::new(config)?;
        Ok(Arc::new(embedder))
    }

    /// Create an OpenAI embedder with default configuration.
    pub fn openai() -> PlatenResult<Arc<dyn Embedder>> {
        Self::create(EmbedderProvider::OpenAI, EmbedderConfig::default())
    }

    /// Create an OpenAI embedder with a specific model.
    pub fn openai_with_model(
        model: impl Into<String>,
        dims: usize,
    ) -> PlatenResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        };
        Self::create(EmbedderProvider::OpenAI, config)
    }

    /// Create an Ollama embedder with default configuration.
    pub fn ollama() -> PlatenResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: "nomic-embed-text".to_string(),
            embedding_dims: 768,
            ..Default::default()
        };
        Self::create(EmbedderProvider::Ollama, config)
    }

    /// Create an Ollama embedder with a specific model.
    pub fn ollama_with_model(
        model: impl Into<String>,
        dims: usize,
    ) -> PlatenResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        };
        Self::create(EmbedderProvider::Ollama, config)
    }
}
