//! OEM rebrand relationships.
//!
//! Printer and copier lines are routinely sold under a brand different
//! from the manufacturer of the underlying engine. A directed relationship
//! list with series patterns is enough: resolution is a single lookup,
//! brand to OEM, never a traversal.

use serde::{Deserialize, Serialize};

/// How a branded line relates to its true manufacturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OemRelationType {
    /// Brand uses the OEM's print engine.
    Engine,
    /// Whole unit rebadged.
    Rebrand,
    /// Shared platform/chassis.
    Platform,
    /// Joint development.
    Partnership,
}

impl OemRelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OemRelationType::Engine => "engine",
            OemRelationType::Rebrand => "rebrand",
            OemRelationType::Platform => "platform",
            OemRelationType::Partnership => "partnership",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "engine" => Some(OemRelationType::Engine),
            "rebrand" => Some(OemRelationType::Rebrand),
            "platform" => Some(OemRelationType::Platform),
            "partnership" => Some(OemRelationType::Partnership),
            _ => None,
        }
    }
}

/// One brand-to-OEM mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OemRelationship {
    pub id: String,
    /// Brand name as it appears on documents, e.g. "Ricoh".
    pub brand: String,
    /// Regex matched against the brand's series/model strings,
    /// e.g. `(?i)^SP\s*C2\d{2}`.
    pub series_pattern: String,
    /// The manufacturer of the underlying engine/platform.
    pub oem_manufacturer: String,
    pub relation_type: OemRelationType,
    pub confidence: f32,
    /// Set once a human has confirmed the mapping.
    pub verified: bool,
}

impl OemRelationship {
    pub fn new(
        brand: impl Into<String>,
        series_pattern: impl Into<String>,
        oem_manufacturer: impl Into<String>,
        relation_type: OemRelationType,
        confidence: f32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            brand: brand.into(),
            series_pattern: series_pattern.into(),
            oem_manufacturer: oem_manufacturer.into(),
            relation_type,
            confidence,
            verified: false,
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_type_round_trip() {
        for rt in [
            OemRelationType::Engine,
            OemRelationType::Rebrand,
            OemRelationType::Platform,
            OemRelationType::Partnership,
        ] {
            assert_eq!(OemRelationType::parse(rt.as_str()), Some(rt));
        }
    }
}
