//! Chunk types.

use serde::{Deserialize, Serialize};

/// A human-facing page label.
///
/// Service manuals commonly number front matter in roman numerals and the
/// body in arabic numerals, so the numeric page index alone is not what a
/// reader sees printed on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "style", content = "value")]
pub enum PageLabel {
    /// Arabic body page, e.g. "42".
    Arabic(usize),
    /// Roman front-matter page, e.g. "iv".
    Roman(usize),
}

impl PageLabel {
    /// Render the label as it would appear on the printed page.
    pub fn render(&self) -> String {
        match self {
            PageLabel::Arabic(n) => n.to_string(),
            PageLabel::Roman(n) => to_roman(*n),
        }
    }
}

fn to_roman(mut n: usize) -> String {
    const TABLE: &[(usize, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for &(value, glyph) in TABLE {
        while n >= value {
            out.push_str(glyph);
            n -= value;
        }
    }
    out
}

/// A contiguous unit of document text.
///
/// Text is immutable after creation; embedding and link fields are
/// populated by later stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// Position within the document, 0-based.
    pub ordinal: usize,
    pub text: String,
    /// Stable hash over normalized text, unique per document.
    pub fingerprint: String,
    /// First numeric page this chunk's text appears on.
    pub page_start: usize,
    /// Last numeric page this chunk's text appears on. Equal to
    /// `page_start` unless the chunk spans a page boundary.
    pub page_end: usize,
    /// Printed label of `page_start`.
    pub page_label_start: PageLabel,
    /// Printed label of `page_end`.
    pub page_label_end: PageLabel,
    /// Hierarchy path from the structure scan,
    /// e.g. `["Chapter 3", "3.2 Error Codes"]`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub section_hierarchy: Vec<String>,
    /// Doubly-linked navigation to adjacent chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_chunk_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_chunk_id: Option<String>,
    pub processing_status: super::ProcessingStatus,
}

impl Chunk {
    pub fn new(
        document_id: impl Into<String>,
        ordinal: usize,
        text: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            ordinal,
            text: text.into(),
            fingerprint: fingerprint.into(),
            page_start: 1,
            page_end: 1,
            page_label_start: PageLabel::Arabic(1),
            page_label_end: PageLabel::Arabic(1),
            section_hierarchy: Vec::new(),
            prev_chunk_id: None,
            next_chunk_id: None,
            processing_status: super::ProcessingStatus::Pending,
        }
    }

    /// Set the numeric page span and matching labels.
    pub fn with_pages(mut self, start: usize, end: usize, front_matter_pages: usize) -> Self {
        self.page_start = start;
        self.page_end = end;
        self.page_label_start = label_for(start, front_matter_pages);
        self.page_label_end = label_for(end, front_matter_pages);
        self
    }

    /// Set the section hierarchy path.
    pub fn with_hierarchy(mut self, path: Vec<String>) -> Self {
        self.section_hierarchy = path;
        self
    }
}

/// Compute the printed label for a 1-based numeric page, given how many
/// leading pages belong to the roman-numbered front matter.
pub fn label_for(page: usize, front_matter_pages: usize) -> PageLabel {
    if page <= front_matter_pages {
        PageLabel::Roman(page)
    } else {
        PageLabel::Arabic(page - front_matter_pages)
    }
}

/// Outcome of a chunk insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A new chunk row was created.
    Created(String),
    /// An identical fingerprint already existed; the existing id is
    /// returned and nothing was written.
    DuplicateIgnored(String),
}

impl ChunkOutcome {
    /// The chunk id regardless of outcome.
    pub fn chunk_id(&self) -> &str {
        match self {
            ChunkOutcome::Created(id) | ChunkOutcome::DuplicateIgnored(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roman_rendering() {
        assert_eq!(PageLabel::Roman(4).render(), "iv");
        assert_eq!(PageLabel::Roman(9).render(), "ix");
        assert_eq!(PageLabel::Roman(14).render(), "xiv");
        assert_eq!(PageLabel::Arabic(42).render(), "42");
    }

    #[test]
    fn test_label_for_front_matter_boundary() {
        // 6 roman pages, then the body restarts at "1"
        assert_eq!(label_for(6, 6), PageLabel::Roman(6));
        assert_eq!(label_for(7, 6), PageLabel::Arabic(1));
        assert_eq!(label_for(48, 6), PageLabel::Arabic(42));
    }

    #[test]
    fn test_page_spanning_chunk_keeps_both_labels() {
        let chunk = Chunk::new("doc1", 0, "text", "fp").with_pages(10, 11, 0);
        assert_eq!(chunk.page_start, 10);
        assert_eq!(chunk.page_end, 11);
        assert_eq!(chunk.page_label_end, PageLabel::Arabic(11));
    }

    #[test]
    fn test_chunk_outcome_id() {
        let outcome = ChunkOutcome::DuplicateIgnored("c1".into());
        assert_eq!(outcome.chunk_id(), "c1");
    }
}
