//! Manufacturer-scoped error-code extraction.
//!
//! A candidate needs both a shape match from the manufacturer's rule and a
//! minimum surrounding-context score; bare shape matches are how page and
//! part numbers sneak in.

use tracing::debug;

use crate::config::ExtractionConfig;
use crate::extract::parts::find_parts_near;
use crate::extract::rules::{CompiledRule, RuleTable};
use crate::types::{Chunk, ErrorCode, ExtractionMethod, ImageItem};

/// Base confidence for a bare shape match.
const SHAPE_CONFIDENCE: f32 = 0.5;
/// Added per context keyword found near the match.
const KEYWORD_CONFIDENCE: f32 = 0.15;
/// Byte radius around a match inspected for keywords and solution text.
const CONTEXT_RADIUS: usize = 300;

/// Extracts error codes from chunks using the manufacturer rule table.
pub struct ErrorCodeExtractor {
    table: RuleTable,
    config: ExtractionConfig,
}

impl ErrorCodeExtractor {
    pub fn new(table: RuleTable, config: ExtractionConfig) -> Self {
        Self { table, config }
    }

    pub fn rule_table(&self) -> &RuleTable {
        &self.table
    }

    /// Extract confidence-scored error codes from one chunk.
    ///
    /// `images` are the document's images; a same-page image whose context
    /// mentions the code gets linked. Candidates below the rule's or the
    /// global minimum confidence are dropped.
    pub fn extract_from_chunk(
        &self,
        chunk: &Chunk,
        manufacturer: &str,
        product: Option<&str>,
        images: &[ImageItem],
    ) -> Vec<ErrorCode> {
        let Some(rule) = self.table.for_manufacturer(manufacturer) else {
            debug!(manufacturer, "no extraction rule; skipping chunk");
            return Vec::new();
        };

        let mut codes: Vec<ErrorCode> = Vec::new();
        for m in rule.pattern.find_iter(&chunk.text) {
            let code_str = m.as_str();
            if codes.iter().any(|c| c.code == code_str) {
                continue;
            }

            let window = context_window(&chunk.text, m.start(), m.end());
            let (confidence, keyword_hits) = score(rule, window);
            if keyword_hits == 0
                || confidence < rule.rule.min_confidence
                || confidence < self.config.min_confidence
            {
                debug!(code = code_str, confidence, "candidate rejected");
                continue;
            }

            let mut code = ErrorCode::new(
                code_str,
                &rule.rule.manufacturer,
                confidence,
                ExtractionMethod::RuleTable,
            )
            .with_document(&chunk.document_id)
            .with_chunk(&chunk.id);

            if let Some(product) = product {
                code = code.with_product(product);
            }
            if let Some(desc) = describing_sentence(&chunk.text, m.start(), m.end()) {
                code = code.with_description(desc);
            }
            if let Some(solution) = solution_text(window) {
                code = code.with_solution(solution);
            }

            let parts = find_parts_near(
                &chunk.text,
                m.start(),
                m.end(),
                self.config.part_link_window,
            );
            if !parts.is_empty() {
                code = code.with_linked_parts(parts);
            }

            // Page 0 marks an image the extractor could not place on a
            // page; those link by context mention alone.
            if let Some(image) = images.iter().find(|img| {
                let on_page = img.page == 0
                    || (img.page >= chunk.page_start && img.page <= chunk.page_end);
                on_page && img.context.mentions_code(code_str)
            }) {
                code = code.with_image(&image.id);
            }

            codes.push(code);
        }
        codes
    }
}

/// Slice a byte window around a match, snapped to char boundaries.
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let mut lo = start.saturating_sub(CONTEXT_RADIUS);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + CONTEXT_RADIUS).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi]
}

/// Confidence plus how many required keywords appeared in the window.
fn score(rule: &CompiledRule, window: &str) -> (f32, usize) {
    let lower = window.to_lowercase();
    let hits = rule
        .rule
        .context_keywords
        .iter()
        .filter(|kw| lower.contains(kw.as_str()))
        .count();
    let confidence = (SHAPE_CONFIDENCE + hits as f32 * KEYWORD_CONFIDENCE).min(0.99);
    (confidence, hits)
}

/// The sentence containing the match, as a short description.
fn describing_sentence(text: &str, start: usize, end: usize) -> Option<String> {
    let sentence_start = text[..start].rfind(['.', '\n']).map(|i| i + 1).unwrap_or(0);
    let sentence_end = text[end..]
        .find(['.', '\n'])
        .map(|i| end + i + 1)
        .unwrap_or(text.len());
    let sentence = text[sentence_start..sentence_end].trim();
    if sentence.is_empty() {
        None
    } else {
        Some(sentence.to_string())
    }
}

/// Text following a "Solution:"/"Remedy:"/"Correction:" marker in the window.
fn solution_text(window: &str) -> Option<String> {
    let lower = window.to_lowercase();
    for marker in ["solution:", "remedy:", "correction:", "actions:"] {
        if let Some(idx) = lower.find(marker) {
            let after = &window[idx + marker.len()..];
            let end = after.find(['\n']).unwrap_or(after.len());
            let solution = after[..end].trim();
            if !solution.is_empty() {
                return Some(solution.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::text_fingerprint;

    fn extractor() -> ErrorCodeExtractor {
        ErrorCodeExtractor::new(RuleTable::builtin(), ExtractionConfig::default())
    }

    fn chunk(text: &str) -> Chunk {
        let fp = text_fingerprint(text);
        Chunk::new("d1", 0, text, fp).with_pages(42, 42, 0)
    }

    #[test]
    fn test_spec_scenario_hp_paper_jam() {
        let c = chunk(
            "Error 13.20.01 Paper Jam. Cause: sensor fault. Solution: replace sensor PS-3",
        );
        let codes = extractor().extract_from_chunk(&c, "HP", None, &[]);
        assert_eq!(codes.len(), 1);
        let code = &codes[0];
        assert_eq!(code.code, "13.20.01");
        assert!(code.confidence > 0.8);
        assert!(code.solution_text.as_deref().unwrap().contains("replace sensor PS-3"));
        assert_eq!(code.linked_parts, vec!["PS-3".to_string()]);
        assert_eq!(code.chunk_id.as_deref(), Some(c.id.as_str()));
    }

    #[test]
    fn test_hp_short_code_with_context() {
        let c = chunk("Error 50.1 Fuser error. Cause: lamp overheated. Solution: replace the fuser");
        let codes = extractor().extract_from_chunk(&c, "HP", None, &[]);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "50.1");
    }

    #[test]
    fn test_bare_shape_without_context_rejected() {
        // Looks like an HP code but reads like a page reference
        let c = chunk("see section 12.34 for details on paper handling");
        let codes = extractor().extract_from_chunk(&c, "HP", None, &[]);
        assert!(codes.is_empty());
    }

    #[test]
    fn test_unknown_manufacturer_yields_nothing() {
        let c = chunk("Error 13.20.01. Cause: x. Solution: y");
        assert!(extractor()
            .extract_from_chunk(&c, "Olivetti", None, &[])
            .is_empty());
    }

    #[test]
    fn test_product_scoping_applied() {
        let c = chunk("Error 13.20.01 jam. Cause: sensor. Solution: reseat");
        let codes = extractor().extract_from_chunk(&c, "HP", Some("LaserJet M607"), &[]);
        assert_eq!(codes[0].product.as_deref(), Some("LaserJet M607"));
    }

    #[test]
    fn test_same_page_image_linked_by_context_mention() {
        use crate::types::MediaContext;
        let c = chunk("Error 13.20.01 jam. Cause: sensor. Solution: replace");
        let image = crate::types::ImageItem::new("d1", 42, "h", "blob://img").with_context(
            MediaContext {
                context_caption: Some("Figure 9: 13.20.01 sensor location".into()),
                ..Default::default()
            },
        );
        let other_page = crate::types::ImageItem::new("d1", 7, "h2", "blob://img2");
        let codes =
            extractor().extract_from_chunk(&c, "HP", None, &[other_page, image.clone()]);
        assert_eq!(codes[0].image_id.as_deref(), Some(image.id.as_str()));
    }

    #[test]
    fn test_unattributed_page_image_linked_by_context_mention() {
        use crate::types::MediaContext;
        let c = chunk("Error 13.20.01 jam. Cause: sensor. Solution: replace");
        let image = crate::types::ImageItem::new("d1", 0, "h", "blob://img").with_context(
            MediaContext {
                context_caption: Some("Figure 3: 13.20.01 jam sensor".into()),
                ..Default::default()
            },
        );
        let codes = extractor().extract_from_chunk(&c, "HP", None, &[image.clone()]);
        assert_eq!(codes[0].image_id.as_deref(), Some(image.id.as_str()));
    }

    #[test]
    fn test_duplicate_mentions_collapse_within_chunk() {
        let c = chunk("Error 13.20.01 jam. Cause: sensor. 13.20.01 repeats. Solution: replace");
        let codes = extractor().extract_from_chunk(&c, "HP", None, &[]);
        assert_eq!(codes.len(), 1);
    }

    #[test]
    fn test_ricoh_remedy_marker() {
        let c = chunk("SC542 fusing error. Cause: thermistor. Solution: replace the thermistor");
        let codes = extractor().extract_from_chunk(&c, "Ricoh", None, &[]);
        assert_eq!(codes.len(), 1);
        assert!(codes[0].solution_text.is_some());
    }
}
