//! Core types for raw content extraction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One page of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-based page number in physical order.
    pub number: usize,
    /// Extracted text in reading order.
    pub text: String,
    /// Running header, where one was detected on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl PageRecord {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            header: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }
}

/// An image found inside a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImage {
    /// Page the image appears on.
    pub page: usize,
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format, e.g. "jpeg", "png", "svg".
    pub format: String,
    /// Whether the source is vector drawing commands rather than pixels.
    #[serde(default)]
    pub is_vector: bool,
    /// Bounding box on the page (x, y, width, height), where available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
    /// Nearby caption text, where one was detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// A table found inside a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTable {
    pub page: usize,
    /// Header row, where detected.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Everything an extractor pulls out of one raw document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub pages: Vec<PageRecord>,
    /// How many leading pages belong to roman-numbered front matter.
    #[serde(default)]
    pub front_matter_pages: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<RawImage>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tables: Vec<RawTable>,
    /// Format-specific metadata (producer, title, ...).
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExtractedDocument {
    pub fn new(pages: Vec<PageRecord>) -> Self {
        Self {
            pages,
            front_matter_pages: 0,
            images: Vec::new(),
            tables: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Full text with pages joined by newlines.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Total word count across pages.
    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.text.split_whitespace().count())
            .sum()
    }

    /// Whether extraction produced any usable text.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        let doc = ExtractedDocument::new(vec![
            PageRecord::new(1, "one two three"),
            PageRecord::new(2, "four five"),
        ]);
        assert_eq!(doc.word_count(), 5);
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let doc = ExtractedDocument::new(vec![PageRecord::new(1, "   \n ")]);
        assert!(doc.is_empty());
    }
}
