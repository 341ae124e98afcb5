//! Plain-text extraction.
//!
//! Bulletins and OCR output arrive as UTF-8 text; pages are delimited by
//! form feeds when the producer preserved them.

use crate::error::{ExtractError, ExtractResult};
use crate::tables::detect_tables;
use crate::types::{ExtractedDocument, PageRecord};
use crate::Extractor;
use async_trait::async_trait;

/// Plain-text extractor.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for TextExtractor {
    async fn extract(&self, content: &[u8]) -> ExtractResult<ExtractedDocument> {
        let text = String::from_utf8_lossy(content);
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyContent);
        }

        let pages: Vec<PageRecord> = text
            .split('\x0c')
            .enumerate()
            .map(|(i, t)| PageRecord::new(i + 1, t.trim_end()))
            .collect();

        let mut tables = Vec::new();
        for page in &pages {
            tables.extend(detect_tables(page.number, &page.text));
        }

        let mut doc = ExtractedDocument::new(pages);
        doc.tables = tables;
        Ok(doc)
    }

    fn supported_types(&self) -> &[&str] {
        &["text/plain", "text/markdown"]
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_extraction_pages() {
        let doc = TextExtractor::new()
            .extract(b"page one\x0cpage two")
            .await
            .unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.word_count(), 4);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let result = TextExtractor::new().extract(b"   ").await;
        assert!(matches!(result, Err(ExtractError::EmptyContent)));
    }

    #[tokio::test]
    async fn test_tables_detected_in_text() {
        let doc = TextExtractor::new()
            .extract(b"| Code | Meaning |\n| 50.1 | Fuser |\n| 13.2 | Jam |")
            .await
            .unwrap();
        assert_eq!(doc.tables.len(), 1);
    }
}
