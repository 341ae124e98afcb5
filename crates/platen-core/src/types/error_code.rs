//! Detected error/fault codes.

use serde::{Deserialize, Serialize};

/// How an error code was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Manufacturer rule table over chunk text.
    RuleTable,
    /// Parsed out of an extracted table.
    TableParse,
    /// Supplied by an operator.
    Manual,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::RuleTable => "rule_table",
            ExtractionMethod::TableParse => "table_parse",
            ExtractionMethod::Manual => "manual",
        }
    }
}

/// A detected fault/status code.
///
/// Uniqueness is scoped to (code, manufacturer, product, document, video):
/// the same numeric code legitimately recurs across models and sources and
/// must not collapse into one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCode {
    pub id: String,
    pub code: String,
    pub manufacturer: String,
    /// Model scoping; the same code can mean different things per model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_text: Option<String>,
    pub confidence: f32,
    pub extraction_method: ExtractionMethod,
    /// Originating chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    /// Same-page image whose context mentions this code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Part numbers found near the code/solution span.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub linked_parts: Vec<String>,
    /// OEM manufacturer this code is additionally tagged with, when the
    /// owning document's model matched a known rebrand pattern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oem_manufacturer: Option<String>,
}

impl ErrorCode {
    pub fn new(
        code: impl Into<String>,
        manufacturer: impl Into<String>,
        confidence: f32,
        extraction_method: ExtractionMethod,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            manufacturer: manufacturer.into(),
            product: None,
            document_id: None,
            video_id: None,
            description: None,
            solution_text: None,
            confidence,
            extraction_method,
            chunk_id: None,
            image_id: None,
            linked_parts: Vec::new(),
            oem_manufacturer: None,
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution_text = Some(solution.into());
        self
    }

    pub fn with_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_linked_parts(mut self, parts: Vec<String>) -> Self {
        self.linked_parts = parts;
        self
    }

    pub fn with_oem_manufacturer(mut self, oem: impl Into<String>) -> Self {
        self.oem_manufacturer = Some(oem.into());
        self
    }

    /// The 5-tuple identity key, with absent members normalized to "".
    pub fn identity_key(&self) -> (String, String, String, String, String) {
        (
            self.code.clone(),
            self.manufacturer.clone(),
            self.product.clone().unwrap_or_default(),
            self.document_id.clone().unwrap_or_default(),
            self.video_id.clone().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_normalizes_none() {
        let a = ErrorCode::new("13.20.01", "HP", 0.9, ExtractionMethod::RuleTable)
            .with_document("d1");
        let b = ErrorCode::new("13.20.01", "HP", 0.7, ExtractionMethod::RuleTable)
            .with_document("d1");
        assert_eq!(a.identity_key(), b.identity_key());

        let c = b.clone().with_product("LaserJet M607");
        assert_ne!(a.identity_key(), c.identity_key());
    }
}
