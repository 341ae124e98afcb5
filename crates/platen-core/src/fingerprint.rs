//! Content addressing for documents, chunks, and media.
//!
//! Text fingerprints hash a normalized form so whitespace variance between
//! two extractions of the same page does not defeat dedup. Binary content
//! (document bytes, images) is hashed as-is with SHA-256.

use sha2::{Digest, Sha256};

/// Normalize text for fingerprinting: lowercase, collapse all whitespace
/// runs to a single space, trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable fingerprint of a chunk's text.
pub fn text_fingerprint(text: &str) -> String {
    format!("{:x}", md5::compute(normalize(text)))
}

/// SHA-256 hex digest of raw bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize("  Error   13.20.01\n\tPaper Jam  "),
            "error 13.20.01 paper jam"
        );
    }

    #[test]
    fn test_fingerprint_stable_under_whitespace() {
        let a = text_fingerprint("Error 13.20.01 Paper Jam");
        let b = text_fingerprint("  Error  13.20.01\nPaper   Jam ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_for_different_text() {
        assert_ne!(
            text_fingerprint("Error 13.20.01"),
            text_fingerprint("Error 13.20.02")
        );
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let h = content_hash(b"bytes");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash(b"bytes"));
        assert_ne!(h, content_hash(b"other"));
    }
}
