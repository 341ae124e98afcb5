//! Extraction routing for processing content through appropriate extractors.

use std::sync::Arc;

use crate::error::{ExtractError, ExtractResult};
use crate::types::ExtractedDocument;
use crate::Extractor;

/// Routes raw content to the appropriate extractor based on MIME type.
pub struct ExtractionRouter {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractionRouter {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create a router with all available extractors.
    pub fn with_defaults() -> Self {
        Self {
            extractors: crate::ExtractorFactory::all(),
        }
    }

    /// Add an extractor to the router.
    pub fn add_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Extract content using the appropriate extractor for the MIME type.
    pub async fn extract(
        &self,
        content: &[u8],
        mime_type: &str,
    ) -> ExtractResult<ExtractedDocument> {
        for extractor in &self.extractors {
            if extractor.supports(mime_type) {
                return extractor.extract(content).await;
            }
        }

        Err(ExtractError::UnsupportedType(mime_type.to_string()))
    }

    /// Check if the router can handle a given MIME type.
    pub fn supports(&self, mime_type: &str) -> bool {
        self.extractors.iter().any(|e| e.supports(mime_type))
    }

    /// List all supported MIME types.
    pub fn supported_types(&self) -> Vec<&str> {
        self.extractors
            .iter()
            .flat_map(|e| e.supported_types().iter().copied())
            .collect()
    }
}

impl Default for ExtractionRouter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_support_text() {
        let router = ExtractionRouter::with_defaults();
        assert!(router.supports("text/plain"));

        #[cfg(feature = "pdf")]
        assert!(router.supports("application/pdf"));
    }

    #[tokio::test]
    async fn test_unsupported_type_error() {
        let router = ExtractionRouter::new();
        let result = router.extract(b"test", "video/mp4").await;
        assert!(matches!(result, Err(ExtractError::UnsupportedType(_))));
    }
}
