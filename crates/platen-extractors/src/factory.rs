//! Factory for creating extractors.

use std::sync::Arc;

use crate::text::TextExtractor;
use crate::Extractor;

#[cfg(feature = "pdf")]
use crate::pdf::PdfExtractor;

/// Factory for creating extractors.
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// All extractors available under the enabled features.
    pub fn all() -> Vec<Arc<dyn Extractor>> {
        let mut extractors: Vec<Arc<dyn Extractor>> = vec![Arc::new(TextExtractor::new())];

        #[cfg(feature = "pdf")]
        extractors.push(Arc::new(PdfExtractor::new()));

        extractors
    }

    /// Create a plain-text extractor.
    pub fn text() -> Arc<dyn Extractor> {
        Arc::new(TextExtractor::new())
    }

    /// Create a PDF extractor.
    #[cfg(feature = "pdf")]
    pub fn pdf() -> Arc<dyn Extractor> {
        Arc::new(PdfExtractor::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_includes_text() {
        let extractors = ExtractorFactory::all();
        assert!(extractors.iter().any(|e| e.name() == "text"));
    }
}
