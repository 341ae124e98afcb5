//! OEM rebrand resolution.
//!
//! Resolution is a lookup over a directed relationship list: the model
//! string is matched against known brand/series patterns and, on a hit,
//! entities from the document are additionally tagged with the true OEM
//! manufacturer so cross-brand search works.

use regex::Regex;
use tracing::warn;

use crate::types::OemRelationship;

/// A relationship with its series pattern compiled.
struct CompiledRelationship {
    rel: OemRelationship,
    pattern: Regex,
}

/// Resolver over the OEM relationship table.
pub struct OemResolver {
    relationships: Vec<CompiledRelationship>,
}

impl OemResolver {
    /// Compile a relationship list. Entries whose pattern fails to compile
    /// are dropped with a warning rather than failing resolution for the
    /// rest of the table.
    pub fn new(relationships: Vec<OemRelationship>) -> Self {
        let relationships = relationships
            .into_iter()
            .filter_map(|rel| match Regex::new(&rel.series_pattern) {
                Ok(pattern) => Some(CompiledRelationship { rel, pattern }),
                Err(e) => {
                    warn!(
                        brand = %rel.brand,
                        pattern = %rel.series_pattern,
                        error = %e,
                        "dropping OEM relationship with invalid pattern"
                    );
                    None
                }
            })
            .collect();
        Self { relationships }
    }

    /// Built-in seed relationships for common rebrand lines.
    pub fn seed() -> Vec<OemRelationship> {
        use crate::types::OemRelationType::*;
        vec![
            OemRelationship::new("Ricoh", r"(?i)^Aficio\s+SP\s*\d{3}", "Brother", Engine, 0.9)
                .verified(),
            OemRelationship::new("Xerox", r"(?i)^DocuPrint\s+M\d{3}", "Fuji Xerox", Rebrand, 0.85),
            OemRelationship::new("Lanier", r"(?i)^LD\d{3}", "Ricoh", Rebrand, 0.95).verified(),
            OemRelationship::new("Savin", r"(?i)^MP\s*C?\d{4}", "Ricoh", Rebrand, 0.95).verified(),
            OemRelationship::new("Gestetner", r"(?i)^DSm\d{3}", "Ricoh", Rebrand, 0.9),
            OemRelationship::new("Olivetti", r"(?i)^d-Copia\s*\d{4}", "Konica Minolta", Platform, 0.8),
        ]
    }

    /// Resolve a (brand, model) pair to its OEM relationship, if any.
    ///
    /// The brand must match the relationship's brand name and the model
    /// string must match its series pattern.
    pub fn resolve(&self, brand: &str, model: &str) -> Option<&OemRelationship> {
        self.relationships
            .iter()
            .filter(|c| c.rel.brand.eq_ignore_ascii_case(brand))
            .find(|c| c.pattern.is_match(model))
            .map(|c| &c.rel)
    }

    /// Number of usable relationships.
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OemRelationType;

    #[test]
    fn test_resolve_rebrand() {
        let resolver = OemResolver::new(OemResolver::seed());
        let rel = resolver.resolve("Ricoh", "Aficio SP 204").unwrap();
        assert_eq!(rel.oem_manufacturer, "Brother");
        assert_eq!(rel.relation_type, OemRelationType::Engine);
    }

    #[test]
    fn test_brand_must_match() {
        let resolver = OemResolver::new(OemResolver::seed());
        assert!(resolver.resolve("HP", "Aficio SP 204").is_none());
    }

    #[test]
    fn test_model_outside_series_not_resolved() {
        let resolver = OemResolver::new(OemResolver::seed());
        assert!(resolver.resolve("Ricoh", "IM C3000").is_none());
    }

    #[test]
    fn test_invalid_pattern_dropped_not_fatal() {
        let bad = OemRelationship::new("X", "[", "Y", OemRelationType::Rebrand, 0.5);
        let good = OemRelationship::new(
            "Lanier",
            r"(?i)^LD\d{3}",
            "Ricoh",
            OemRelationType::Rebrand,
            0.95,
        );
        let resolver = OemResolver::new(vec![bad, good]);
        assert_eq!(resolver.len(), 1);
        assert!(resolver.resolve("Lanier", "LD130").is_some());
    }
}
