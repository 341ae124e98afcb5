//! PDF content extraction using pdf-extract.

use crate::error::{ExtractError, ExtractResult};
use crate::tables::detect_tables;
use crate::types::{ExtractedDocument, PageRecord, RawImage};
use crate::Extractor;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a roman-numeral page label line, as printed in front matter.
static ROMAN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[ivxlc]{1,7}\s*$").expect("static regex"));

/// Upper bound on embedded images pulled from one document.
const MAX_EMBEDDED_IMAGES: usize = 256;

/// PDF content extractor using the pdf-extract library.
///
/// Wraps synchronous pdf-extract calls in spawn_blocking to avoid blocking
/// the async runtime. Embedded JPEG streams are recovered with a byte scan
/// over the raw file; pdf-extract itself only yields text.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    /// Minimum text length to consider extraction successful
    /// (helps detect image-based scans that need OCR elsewhere).
    min_text_length: usize,
}

impl PdfExtractor {
    /// Create a new PDF extractor with default settings.
    pub fn new() -> Self {
        Self {
            min_text_length: 10,
        }
    }

    /// Create a PDF extractor with a custom minimum text threshold.
    pub fn with_min_text_length(min_text_length: usize) -> Self {
        Self { min_text_length }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Split extracted text into pages on the form feeds pdf-extract emits
/// between pages. A document without form feeds becomes one page.
fn split_pages(text: &str) -> Vec<PageRecord> {
    let parts: Vec<&str> = text.split('\x0c').collect();
    parts
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.trim().is_empty() || parts.len() == 1)
        .map(|(i, t)| {
            let mut page = PageRecord::new(i + 1, t.trim_end());
            // First non-blank line repeated across pages is the running
            // header; a single page cannot establish repetition, so only
            // short title-cased first lines are taken.
            if let Some(first) = t.lines().find(|l| !l.trim().is_empty()) {
                let first = first.trim();
                if first.len() <= 60 && !first.ends_with('.') {
                    page = page.with_header(first);
                }
            }
            page
        })
        .collect()
}

/// Count leading pages whose printed label is a roman numeral.
fn count_front_matter(pages: &[PageRecord]) -> usize {
    pages
        .iter()
        .take_while(|p| ROMAN_LABEL.is_match(&p.text))
        .count()
}

/// Scan raw PDF bytes for embedded JPEG streams (DCTDecode payloads keep
/// their JFIF framing intact inside the file).
fn scan_jpeg_streams(bytes: &[u8]) -> Vec<RawImage> {
    const SOI: &[u8] = &[0xff, 0xd8, 0xff];
    const EOI: &[u8] = &[0xff, 0xd9];

    let mut images = Vec::new();
    let mut offset = 0;
    while images.len() < MAX_EMBEDDED_IMAGES {
        let Some(start) = find(&bytes[offset..], SOI).map(|i| offset + i) else {
            break;
        };
        let Some(end) = find(&bytes[start..], EOI).map(|i| start + i + EOI.len()) else {
            break;
        };
        // Tiny streams are icons or inline thumbnails, not figures.
        if end - start > 1024 {
            images.push(RawImage {
                page: 0, // byte scan sees no xref table; 0 means unknown page
                data: bytes[start..end].to_vec(),
                format: "jpeg".to_string(),
                is_vector: false,
                bbox: None,
                caption: None,
            });
        }
        offset = end;
    }
    images
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(&self, content: &[u8]) -> ExtractResult<ExtractedDocument> {
        let bytes = content.to_vec();
        let min_text_length = self.min_text_length;

        tokio::task::spawn_blocking(move || {
            #[cfg(feature = "pdf")]
            {
                let text = pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| ExtractError::Pdf(e.to_string()))?;

                if text.trim().len() < min_text_length {
                    return Err(ExtractError::EmptyContent);
                }

                let pages = split_pages(&text);
                let front_matter_pages = count_front_matter(&pages);
                let mut tables = Vec::new();
                for page in &pages {
                    tables.extend(detect_tables(page.number, &page.text));
                }
                let images = scan_jpeg_streams(&bytes);

                tracing::debug!(
                    pages = pages.len(),
                    tables = tables.len(),
                    images = images.len(),
                    "pdf extraction complete"
                );

                let mut doc = ExtractedDocument::new(pages);
                doc.front_matter_pages = front_matter_pages;
                doc.tables = tables;
                doc.images = images;
                Ok(doc)
            }

            #[cfg(not(feature = "pdf"))]
            {
                let _ = (bytes, min_text_length);
                Err(ExtractError::UnsupportedType(
                    "pdf feature not enabled".to_string(),
                ))
            }
        })
        .await?
    }

    fn supported_types(&self) -> &[&str] {
        &["application/pdf"]
    }

    fn name(&self) -> &str {
        "pdf-extract"
    }
}
