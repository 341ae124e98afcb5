//! Structure & chunk builder.
//!
//! Scans the linear text stream for structural markers and produces
//! ordered chunks carrying a stack-based hierarchy path, page spans, and
//! content fingerprints. Chunks with no detectable heading inherit the
//! nearest ancestor's path.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::fingerprint::text_fingerprint;
use crate::types::Chunk;
use platen_extractors::PageRecord;

static CHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(chapter|part|appendix)\s+([0-9IVXLC]+)\b[.:]?\s*(.*)$")
        .expect("static regex"));
static NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+(\p{Lu}.*)$").expect("static regex"));
static ERROR_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(error|fault|service)\s+codes?\b").expect("static regex"));

/// A detected structural heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Nesting depth, 1-based. "Chapter 3" is 1, "3.2 Error Codes" is 2.
    pub level: usize,
    pub title: String,
}

/// Detect whether a line is a structural heading.
///
/// Recognizes chapter/part/appendix lines, numbered section headers, the
/// explicit "Error Codes" section boundary common in service manuals, and
/// short all-caps lines.
pub fn detect_heading(line: &str) -> Option<Heading> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() > 80 {
        return None;
    }

    if CHAPTER.is_match(trimmed) {
        return Some(Heading {
            level: 1,
            title: trimmed.to_string(),
        });
    }

    if let Some(caps) = NUMBERED.captures(trimmed) {
        let numbering = &caps[1];
        let rest = &caps[2];
        // A trailing period means a sentence that happens to start with a
        // number, not a header.
        if !rest.ends_with('.') {
            let level = numbering.matches('.').count() + 1;
            return Some(Heading {
                level: level.min(6),
                title: trimmed.to_string(),
            });
        }
    }

    if ERROR_SECTION.is_match(trimmed) {
        return Some(Heading {
            level: 2,
            title: trimmed.to_string(),
        });
    }

    // Short all-caps lines ("TROUBLESHOOTING", "PARTS LIST")
    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 4
        && trimmed.len() <= 60
        && letters.iter().all(|c| c.is_uppercase())
    {
        return Some(Heading {
            level: 1,
            title: trimmed.to_string(),
        });
    }

    None
}

struct OpenChunk {
    text: String,
    page_start: usize,
    page_end: usize,
    hierarchy: Vec<String>,
}

/// Builds ordered chunks from extracted pages.
pub struct ChunkBuilder {
    config: ChunkingConfig,
}

impl ChunkBuilder {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Build chunks for a document. Pure: persistence, dedup against
    /// existing fingerprints, and prev/next id linking happen in the
    /// chunking stage.
    pub fn build(
        &self,
        document_id: &str,
        pages: &[PageRecord],
        front_matter_pages: usize,
    ) -> Vec<Chunk> {
        let mut protos: Vec<OpenChunk> = Vec::new();
        let mut stack: Vec<(usize, String)> = Vec::new();
        let mut open: Option<OpenChunk> = None;

        for page in pages {
            for line in page.text.lines() {
                if let Some(heading) = detect_heading(line) {
                    if let Some(chunk) = open.take() {
                        push_proto(&mut protos, chunk);
                    }
                    while stack
                        .last()
                        .is_some_and(|(level, _)| *level >= heading.level)
                    {
                        stack.pop();
                    }
                    stack.push((heading.level, heading.title.clone()));
                    open = Some(OpenChunk {
                        text: format!("{}\n", heading.title),
                        page_start: page.number,
                        page_end: page.number,
                        hierarchy: stack.iter().map(|(_, t)| t.clone()).collect(),
                    });
                    continue;
                }

                let chunk = open.get_or_insert_with(|| OpenChunk {
                    text: String::new(),
                    page_start: page.number,
                    page_end: page.number,
                    hierarchy: stack.iter().map(|(_, t)| t.clone()).collect(),
                });
                chunk.page_end = page.number;
                chunk.text.push_str(line);
                chunk.text.push('\n');

                if chunk.text.len() >= self.config.max_chars
                    || (chunk.text.len() >= self.config.target_chars && line.trim().is_empty())
                {
                    let finished = open.take().expect("chunk was just inserted");
                    push_proto(&mut protos, finished);
                }
            }
        }
        if let Some(chunk) = open.take() {
            push_proto(&mut protos, chunk);
        }

        let chunks: Vec<Chunk> = protos
            .into_iter()
            .enumerate()
            .map(|(ordinal, proto)| {
                let text = proto.text.trim().to_string();
                let fingerprint = text_fingerprint(&text);
                Chunk::new(document_id, ordinal, text, fingerprint)
                    .with_pages(proto.page_start, proto.page_end, front_matter_pages)
                    .with_hierarchy(proto.hierarchy)
            })
            .collect();

        debug!(
            document_id,
            chunks = chunks.len(),
            "structure scan complete"
        );
        chunks
    }
}

fn push_proto(protos: &mut Vec<OpenChunk>, chunk: OpenChunk) {
    if !chunk.text.trim().is_empty() {
        protos.push(chunk);
    }
}
