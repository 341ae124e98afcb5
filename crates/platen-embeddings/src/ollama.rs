//! Ollama embedding provider implementations.
//!
//! Text embeddings go through the ollama-rs client; visual-document
//! embeddings post image payloads directly to the embeddings endpoint,
//! for models like colpali served behind an Ollama-compatible API.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use platen_core::error::{PlatenError, PlatenResult};
use platen_core::traits::{Embedder, EmbedderConfig, VisualEmbedder};

#[cfg(feature = "ollama")]
use ollama_rs::{generation::embeddings::request::GenerateEmbeddingsRequest, Ollama};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

fn split_host_port(base_url: &str) -> PlatenResult<(String, u16)> {
    let url = url::Url::parse(base_url)
        .map_err(|e| PlatenError::Configuration(format!("Invalid Ollama URL: {}", e)))?;
    let host = url.host_str().unwrap_or("localhost").to_string();
    let port = url.port().unwrap_or(11434);
    Ok((host, port))
}

/// Ollama text embedding provider.
pub struct OllamaEmbedder {
    #[cfg(feature = "ollama")]
    client: Ollama,
    config: EmbedderConfig,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder.
    pub fn new(config: EmbedderConfig) -> PlatenResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let (host, port) = split_host_port(&base_url)?;

        #[cfg(feature = "ollama")]
        let client = Ollama::new(format!("http://{}", host), port);

        #[cfg(not(feature = "ollama"))]
        let _ = (host, port);

        Ok(Self {
            #[cfg(feature = "ollama")]
            client,
            config,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[cfg(feature = "ollama")]
    async fn embed(&self, text: &str) -> PlatenResult<Vec<f32>> {
        let request = GenerateEmbeddingsRequest::new(self.config.model.clone(), text.into());

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| PlatenError::model_call(format!("Ollama embedding error: {}", e)))?;

        // Convert f64 to f32
        let embedding: Vec<f32> = response.embeddings.into_iter().map(|v| v as f32).collect();

        Ok(embedding)
    }

    #[cfg(not(feature = "ollama"))]
    async fn embed(&self, _text: &str) -> PlatenResult<Vec<f32>> {
        Err(PlatenError::Configuration(
            "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dims
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Deserialize)]
struct ImageEmbeddingResponse {
    embedding: Vec<f64>,
}

/// Visual-document embedder over an Ollama-compatible embeddings endpoint.
pub struct OllamaVisualEmbedder {
    client: reqwest::Client,
    endpoint: String,
    config: EmbedderConfig,
}

impl OllamaVisualEmbedder {
    pub fn new(config: EmbedderConfig) -> PlatenResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        // Validate early so misconfiguration fails at startup.
        split_host_port(&base_url)?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            config,
        })
    }
}

#[async_trait]
impl VisualEmbedder for OllamaVisualEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> PlatenResult<Vec<f32>> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "images": [base64::engine::general_purpose::STANDARD.encode(bytes)],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatenError::model_call(format!("Ollama image embedding error: {}", e)))?;

        if !response.status().is_success() {
            return Err(PlatenError::model_call(format!(
                "Ollama image embedding returned {}",
                response.status()
            )));
        }

        let parsed: ImageEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PlatenError::model_call(format!("Ollama image embedding error: {}", e)))?;

        Ok(parsed.embedding.into_iter().map(|v| v as f32).collect())
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dims
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
