//! Extracted media units: images, vector graphics, and tables.

use serde::{Deserialize, Serialize};

/// Pixel-space bounding box on a page, where available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Context captured around a media item during extraction.
///
/// These fields are what make a diagram or table retrievable from a
/// natural-language question about an error code rather than only by
/// visual similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_header: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub surrounding_paragraphs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related_error_codes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related_products: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related_chunks: Vec<String>,
}

impl MediaContext {
    /// The text fed to the context embedding: caption plus surrounding
    /// prose in reading order. Page headers are excluded; they repeat on
    /// every page of a manual and do not discriminate.
    pub fn embedding_text(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(caption) = &self.context_caption {
            parts.push(caption);
        }
        parts.extend(self.surrounding_paragraphs.iter().map(|s| s.as_str()));
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Whether the context mentions a given error code string.
    pub fn mentions_code(&self, code: &str) -> bool {
        self.related_error_codes.iter().any(|c| c == code)
            || self
                .context_caption
                .as_deref()
                .is_some_and(|c| c.contains(code))
            || self
                .surrounding_paragraphs
                .iter()
                .any(|p| p.contains(code))
    }
}

/// An extracted raster image or vector graphic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageItem {
    pub id: String,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    /// 1-based page number; 0 when the extractor could not attribute one.
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    /// SHA-256 of the image bytes.
    pub content_hash: String,
    /// Blob store URL of the image bytes.
    pub blob_url: String,
    /// Whether the source is a vector graphic (SVG or embedded drawing
    /// commands) rather than raster pixels.
    pub is_vector: bool,
    /// Blob URL of the rasterized derivative, for vector graphics that
    /// have been rendered. The original vector source stays at `blob_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster_url: Option<String>,
    #[serde(default)]
    pub context: MediaContext,
}

impl ImageItem {
    pub fn new(
        document_id: impl Into<String>,
        page: usize,
        content_hash: impl Into<String>,
        blob_url: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            chunk_id: None,
            page,
            bbox: None,
            content_hash: content_hash.into(),
            blob_url: blob_url.into(),
            is_vector: false,
            raster_url: None,
            context: MediaContext::default(),
        }
    }

    pub fn with_vector_source(mut self) -> Self {
        self.is_vector = true;
        self
    }

    pub fn with_raster_url(mut self, url: impl Into<String>) -> Self {
        self.raster_url = Some(url.into());
        self
    }

    pub fn with_context(mut self, context: MediaContext) -> Self {
        self.context = context;
        self
    }

    /// The bytes to feed the visual embedder: the raster derivative for
    /// vector graphics, the original otherwise. `None` means the item is
    /// not embeddable yet.
    pub fn embeddable_url(&self) -> Option<&str> {
        if self.is_vector {
            self.raster_url.as_deref()
        } else {
            Some(&self.blob_url)
        }
    }
}

/// An extracted table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableItem {
    pub id: String,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub content_hash: String,
    /// Header row, where detected.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub headers: Vec<String>,
    /// Body rows.
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub context: MediaContext,
}

impl TableItem {
    pub fn new(
        document_id: impl Into<String>,
        page: usize,
        content_hash: impl Into<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            chunk_id: None,
            page,
            bbox: None,
            content_hash: content_hash.into(),
            headers: Vec::new(),
            rows,
            context: MediaContext::default(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_context(mut self, context: MediaContext) -> Self {
        self.context = context;
        self
    }

    /// Flatten to a markdown-like rendering for the table embedding.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        if !self.headers.is_empty() {
            out.push_str("| ");
            out.push_str(&self.headers.join(" | "));
            out.push_str(" |\n| ");
            out.push_str(&vec!["---"; self.headers.len()].join(" | "));
            out.push_str(" |\n");
        }
        for row in &self.rows {
            out.push_str("| ");
            out.push_str(&row.join(" | "));
            out.push_str(" |\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_image_needs_raster() {
        let img = ImageItem::new("doc1", 3, "hash", "blob://svg").with_vector_source();
        assert!(img.embeddable_url().is_none());
        let img = img.with_raster_url("blob://png");
        assert_eq!(img.embeddable_url(), Some("blob://png"));
    }

    #[test]
    fn test_raster_image_embeds_directly() {
        let img = ImageItem::new("doc1", 3, "hash", "blob://png");
        assert_eq!(img.embeddable_url(), Some("blob://png"));
    }

    #[test]
    fn test_context_embedding_text() {
        let ctx = MediaContext {
            context_caption: Some("Figure 5: fuser unit".into()),
            surrounding_paragraphs: vec!["Remove the rear cover.".into()],
            page_header: Some("Chapter 4".into()),
            ..Default::default()
        };
        let text = ctx.embedding_text().unwrap();
        assert!(text.contains("Figure 5"));
        assert!(text.contains("rear cover"));
        assert!(!text.contains("Chapter 4"));
    }

    #[test]
    fn test_empty_context_has_no_embedding_text() {
        assert!(MediaContext::default().embedding_text().is_none());
    }

    #[test]
    fn test_mentions_code() {
        let ctx = MediaContext {
            context_caption: Some("Error 13.20.01 sensor location".into()),
            ..Default::default()
        };
        assert!(ctx.mentions_code("13.20.01"));
        assert!(!ctx.mentions_code("50.1"));
    }

    #[test]
    fn test_table_markdown() {
        let table = TableItem::new(
            "doc1",
            10,
            "hash",
            vec![vec!["13.20.01".into(), "Paper jam".into()]],
        )
        .with_headers(vec!["Code".into(), "Meaning".into()]);
        let md = table.to_markdown();
        assert!(md.starts_with("| Code | Meaning |"));
        assert!(md.contains("| 13.20.01 | Paper jam |"));
    }
}
