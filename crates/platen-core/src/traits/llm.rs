//! Generation model trait.
//!
//! Used sparingly by the pipeline (query expansion for two-stage
//! retrieval); kept behind a trait so tests run without a backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatenResult;

/// Text generation trait.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Generate text from a prompt.
    async fn generate(&self, prompt: &str) -> PlatenResult<String>;

    /// Get the model name.
    fn model_name(&self) -> &str;
}

/// Generation model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}
