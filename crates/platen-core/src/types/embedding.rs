//! Polymorphic embedding records.

use serde::{Deserialize, Serialize};

/// What a stored vector was derived from.
///
/// The backing store is a single table with this discriminator; keeping it
/// a closed enum keeps call sites exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Chunk text.
    Text,
    /// Image pixel content (visual-document model).
    Image,
    /// Flattened table rendering.
    Table,
    /// A figure caption on its own.
    Caption,
    /// Prose surrounding a media item; what makes a diagram retrievable
    /// from a text question.
    Context,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Text => "text",
            SourceType::Image => "image",
            SourceType::Table => "table",
            SourceType::Caption => "caption",
            SourceType::Context => "context",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(SourceType::Text),
            "image" => Some(SourceType::Image),
            "table" => Some(SourceType::Table),
            "caption" => Some(SourceType::Caption),
            "context" => Some(SourceType::Context),
            _ => None,
        }
    }
}

/// One stored vector.
///
/// At most one record exists per (source_id, source_type, model_name);
/// re-embedding with the same model overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Id of the chunk, image, or table this vector was derived from.
    pub source_id: String,
    pub source_type: SourceType,
    /// Owning document, for per-document listing.
    pub document_id: String,
    pub vector: Vec<f32>,
    pub model_name: String,
    /// For caption/context vectors, the surrounding prose that produced
    /// the vector; for text/table, the embedded text itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_text: Option<String>,
}

impl EmbeddingRecord {
    pub fn new(
        source_id: impl Into<String>,
        source_type: SourceType,
        document_id: impl Into<String>,
        vector: Vec<f32>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_type,
            document_id: document_id.into(),
            vector,
            model_name: model_name.into(),
            context_text: None,
        }
    }

    pub fn with_context_text(mut self, text: impl Into<String>) -> Self {
        self.context_text = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_round_trip() {
        for st in [
            SourceType::Text,
            SourceType::Image,
            SourceType::Table,
            SourceType::Caption,
            SourceType::Context,
        ] {
            assert_eq!(SourceType::parse(st.as_str()), Some(st));
        }
        assert_eq!(SourceType::parse("video"), None);
    }

    #[test]
    fn test_embedding_record_builder() {
        let rec = EmbeddingRecord::new("img1", SourceType::Context, "doc1", vec![0.1], "m")
            .with_context_text("Figure 3: fuser assembly");
        assert_eq!(rec.context_text.as_deref(), Some("Figure 3: fuser assembly"));
    }
}
