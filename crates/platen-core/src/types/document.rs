//! Document types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::pipeline::Stage;

/// Overall processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

/// Status of one stage for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    /// Gated by a feature flag or structurally absent preconditions.
    /// Distinct from `Failed`: nothing went wrong.
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    /// Whether the stage has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
        )
    }

    /// Whether a downstream stage may treat this one as satisfied.
    pub fn satisfies_precondition(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Skipped)
    }
}

/// Persisted state of one (document, stage) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageState {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageState {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// One ingested file.
///
/// Created on upload, mutated only by the stage tracker, never deleted by
/// the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: String,
    /// Original file name.
    pub filename: String,
    /// SHA-256 of the raw bytes.
    pub content_hash: String,
    /// Blob store URL of the original file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_url: Option<String>,
    /// Page count, known after text extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    /// Word count, known after text extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    /// Detected manufacturer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    /// Confidence of the manufacturer detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_confidence: Option<f32>,
    /// Model/series string extracted from the document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Free-form extracted metadata.
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Overall processing status.
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new pending document from uploaded bytes' hash.
    pub fn new(filename: impl Into<String>, content_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            content_hash: content_hash.into(),
            blob_url: None,
            page_count: None,
            word_count: None,
            manufacturer: None,
            manufacturer_confidence: None,
            model: None,
            metadata: HashMap::new(),
            processing_status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the blob store URL.
    pub fn with_blob_url(mut self, url: impl Into<String>) -> Self {
        self.blob_url = Some(url.into());
        self
    }

    /// Set the detected manufacturer with its confidence.
    pub fn with_manufacturer(mut self, name: impl Into<String>, confidence: f32) -> Self {
        self.manufacturer = Some(name.into());
        self.manufacturer_confidence = Some(confidence);
        self
    }

    /// Set the model/series string.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_pending() {
        let doc = Document::new("manual.pdf", "abc123");
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
        assert!(doc.manufacturer.is_none());
    }

    #[test]
    fn test_skipped_satisfies_precondition() {
        assert!(StageStatus::Skipped.satisfies_precondition());
        assert!(StageStatus::Completed.satisfies_precondition());
        assert!(!StageStatus::Failed.satisfies_precondition());
        assert!(!StageStatus::Pending.satisfies_precondition());
    }

    #[test]
    fn test_terminal_states() {
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_document_serialization_omits_none() {
        let doc = Document::new("manual.pdf", "abc123");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("manufacturer"));
        assert!(!json.contains("page_count"));
    }
}
