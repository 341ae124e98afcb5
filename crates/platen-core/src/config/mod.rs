//! Configuration system for platen.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::traits::{EmbedderConfig, EmbedderProvider, LlmConfig};

/// Embedder provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderProviderConfig {
    /// Provider type.
    pub provider: EmbedderProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: EmbedderConfig,
}

impl Default for EmbedderProviderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::OpenAI,
            config: EmbedderConfig::default(),
        }
    }
}

/// Chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub target_chars: usize,
    /// Hard maximum before a forced split.
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: 1500,
            max_chars: 4000,
        }
    }
}

/// Entity extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum confidence for an error-code candidate to be accepted.
    pub min_confidence: f32,
    /// Token window for proximity part-number linking.
    pub part_link_window: usize,
    /// Optional TOML file of manufacturer rules merged over the built-in
    /// defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            part_link_window: 40,
            rules_path: None,
        }
    }
}

/// Main pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Text embedder configuration.
    pub embedder: EmbedderProviderConfig,
    /// Visual-document embedder configuration.
    pub visual_embedder: EmbedderProviderConfig,
    /// Generation model configuration.
    pub llm: LlmConfig,
    /// Path to the pipeline database.
    pub db_path: PathBuf,
    /// Root directory for the local blob store.
    pub blob_root: PathBuf,
    pub chunking: ChunkingConfig,
    pub extraction: ExtractionConfig,
    /// Per-stage timeout in seconds.
    pub stage_timeout_secs: u64,
    /// Bounded concurrency for per-item work inside a stage.
    pub batch_concurrency: usize,
    /// Feature flag: generate first-page thumbnails.
    pub thumbnails_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let platen_dir = dirs::home_dir()
            .map(|h| h.join(".platen"))
            .unwrap_or_else(|| PathBuf::from(".platen"));

        Self {
            embedder: EmbedderProviderConfig::default(),
            visual_embedder: EmbedderProviderConfig {
                provider: EmbedderProvider::Ollama,
                config: EmbedderConfig {
                    model: "colpali".to_string(),
                    embedding_dims: 768,
                    api_key: None,
                    base_url: None,
                },
            },
            llm: LlmConfig::default(),
            db_path: platen_dir.join("platen.db"),
            blob_root: platen_dir.join("blobs"),
            chunking: ChunkingConfig::default(),
            extraction: ExtractionConfig::default(),
            stage_timeout_secs: 300,
            batch_concurrency: 4,
            thumbnails_enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::PlatenResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| crate::error::PlatenError::Configuration(e.to_string()))?,
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| crate::error::PlatenError::Configuration(e.to_string()))?,
            _ => {
                return Err(crate::error::PlatenError::Configuration(format!(
                    "unsupported config format: {}",
                    path.display()
                )))
            }
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.stage_timeout_secs, 300);
        assert!(config.thumbnails_enabled);
        assert_eq!(config.extraction.min_confidence, 0.5);
    }

    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("platen.toml");
        std::fs::write(
            &path,
            r#"
stage_timeout_secs = 60
thumbnails_enabled = false

[chunking]
target_chars = 800
"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.stage_timeout_secs, 60);
        assert!(!config.thumbnails_enabled);
        assert_eq!(config.chunking.target_chars, 800);
        // Untouched sections keep defaults
        assert_eq!(config.extraction.part_link_window, 40);
    }
}
