//! Part-number detection and proximity linking.

use once_cell::sync::Lazy;
use regex::Regex;

/// Part-number shapes seen across service manuals: short prefixed ids
/// ("PS-3", "MK-1150") and long OEM part numbers ("RM1-9623", "A1UD-R701").
static PART_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Z0-9]{0,4}-[0-9A-Z]{1,6}\b").expect("static regex")
});

/// Find part numbers within `window` tokens of the byte span `[start, end)`.
///
/// Proximity is measured in whitespace tokens so that layout differences
/// (line breaks inside a solution paragraph) do not change linking.
pub fn find_parts_near(text: &str, start: usize, end: usize, window: usize) -> Vec<String> {
    let before_tokens = text[..start].split_whitespace().count();
    let span_end_tokens = text[..end.min(text.len())].split_whitespace().count();

    let mut parts = Vec::new();
    for m in PART_PATTERN.find_iter(text) {
        let position = text[..m.start()].split_whitespace().count();
        let distance = if position < before_tokens {
            before_tokens - position
        } else if position > span_end_tokens {
            position - span_end_tokens
        } else {
            0
        };
        if distance <= window && !parts.contains(&m.as_str().to_string()) {
            parts.push(m.as_str().to_string());
        }
    }
    parts
}

/// All part numbers in a text, without proximity filtering.
pub fn find_parts(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for m in PART_PATTERN.find_iter(text) {
        let s = m.as_str().to_string();
        if !parts.contains(&s) {
            parts.push(s);
        }
    }
    parts
}
