//! Data-driven manufacturer rule table.
//!
//! Naked numeric patterns like "30.03" collide across vendors and with
//! page numbers, so each manufacturer carries its own code-shape regex and
//! required surrounding-keyword rules. Adding a manufacturer is a data
//! change, not a code change: built-in defaults can be merged over with a
//! TOML file of `[[manufacturer]]` entries.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PlatenError, PlatenResult};

/// One manufacturer's extraction rule, as serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturerRule {
    pub manufacturer: String,
    /// Regex matching the manufacturer's error-code shape.
    pub code_pattern: String,
    /// Keywords expected near a genuine code mention.
    pub context_keywords: Vec<String>,
    /// Minimum confidence for a candidate from this rule.
    pub min_confidence: f32,
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: ManufacturerRule,
    pub pattern: Regex,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    manufacturer: Vec<ManufacturerRule>,
}

/// The loaded rule table, keyed by manufacturer.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Built-in rules for the common office-equipment vendors.
    pub fn builtin() -> Self {
        let defaults = vec![
            ManufacturerRule {
                manufacturer: "HP".to_string(),
                // Short codes print one digit after the dot ("50.1"),
                // event-log codes two ("13.20.01").
                code_pattern: r"\b\d{2}\.\d{1,2}(?:\.\d{2})?\b".to_string(),
                context_keywords: keywords(&["error", "cause", "solution", "jam", "event"]),
                min_confidence: 0.6,
            },
            ManufacturerRule {
                manufacturer: "Canon".to_string(),
                code_pattern: r"\bE\d{3}(?:-\d{4})?\b".to_string(),
                context_keywords: keywords(&["error", "cause", "remedy", "code"]),
                min_confidence: 0.6,
            },
            ManufacturerRule {
                manufacturer: "Ricoh".to_string(),
                code_pattern: r"\bSC\d{3}(?:-\d{2})?\b".to_string(),
                context_keywords: keywords(&["error", "cause", "solution", "service call"]),
                min_confidence: 0.55,
            },
            ManufacturerRule {
                manufacturer: "Kyocera".to_string(),
                code_pattern: r"\bC\d{4}\b".to_string(),
                context_keywords: keywords(&["error", "cause", "remedy", "call service"]),
                min_confidence: 0.6,
            },
            ManufacturerRule {
                manufacturer: "Brother".to_string(),
                code_pattern: r"\b[EUF]-?\d{2}\b".to_string(),
                context_keywords: keywords(&["error", "unable", "cause", "solution"]),
                min_confidence: 0.65,
            },
            ManufacturerRule {
                manufacturer: "Xerox".to_string(),
                code_pattern: r"\b\d{3}-\d{3}\b".to_string(),
                context_keywords: keywords(&["fault", "error", "cause", "actions"]),
                min_confidence: 0.6,
            },
            ManufacturerRule {
                manufacturer: "Konica Minolta".to_string(),
                code_pattern: r"\bC-?\d{4}\b".to_string(),
                context_keywords: keywords(&["malfunction", "error", "cause", "correction"]),
                min_confidence: 0.6,
            },
        ];

        let rules = defaults
            .into_iter()
            .map(|rule| compile(rule).expect("built-in pattern is valid"))
            .collect();
        Self { rules }
    }

    /// Merge rules from a TOML document over this table; an entry with an
    /// existing manufacturer name replaces it.
    pub fn merge_toml(&mut self, content: &str) -> PlatenResult<()> {
        let file: RuleFile = toml::from_str(content)
            .map_err(|e| PlatenError::Configuration(format!("rule file: {}", e)))?;
        for rule in file.manufacturer {
            let compiled = compile(rule)?;
            self.rules.retain(|r| {
                !r.rule
                    .manufacturer
                    .eq_ignore_ascii_case(&compiled.rule.manufacturer)
            });
            self.rules.push(compiled);
        }
        Ok(())
    }

    /// Load built-ins and merge an optional rule file.
    pub fn load(rules_path: Option<&std::path::Path>) -> PlatenResult<Self> {
        let mut table = Self::builtin();
        if let Some(path) = rules_path {
            let content = std::fs::read_to_string(path)?;
            table.merge_toml(&content)?;
        }
        Ok(table)
    }

    /// Rule for a manufacturer, case-insensitive.
    pub fn for_manufacturer(&self, manufacturer: &str) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .find(|r| r.rule.manufacturer.eq_ignore_ascii_case(manufacturer))
    }

    /// All known manufacturer names.
    pub fn manufacturers(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.rule.manufacturer.as_str()).collect()
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn compile(rule: ManufacturerRule) -> PlatenResult<CompiledRule> {
    let pattern = Regex::new(&rule.code_pattern).map_err(|e| {
        PlatenError::Configuration(format!(
            "invalid code pattern for {}: {}",
            rule.manufacturer, e
        ))
    })?;
    Ok(CompiledRule { rule, pattern })
}

/// Detect the document's manufacturer by counting name mentions.
///
/// Returns the best-scoring manufacturer with a confidence proportional to
/// its share of all name mentions.
pub fn detect_manufacturer(table: &RuleTable, text: &str) -> Option<(String, f32)> {
    let lower = text.to_lowercase();
    let mut counts: Vec<(String, usize)> = table
        .manufacturers()
        .iter()
        .map(|name| (name.to_string(), lower.matches(&name.to_lowercase()).count()))
        .filter(|(_, n)| *n > 0)
        .collect();

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    counts.into_iter().next().map(|(name, n)| {
        let confidence = n as f32 / total as f32;
        (name, confidence)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_common_vendors() {
        let table = RuleTable::builtin();
        assert!(table.for_manufacturer("HP").is_some());
        assert!(table.for_manufacturer("ricoh").is_some());
        assert!(table.for_manufacturer("Olivetti").is_none());
    }

    #[test]
    fn test_hp_shape() {
        let table = RuleTable::builtin();
        let rule = table.for_manufacturer("HP").unwrap();
        assert!(rule.pattern.is_match("Error 13.20.01 Paper Jam"));
        assert!(rule.pattern.is_match("50.1 fuser error"));
        assert!(!rule.pattern.is_match("page 42"));
    }

    #[test]
    fn test_ricoh_shape() {
        let table = RuleTable::builtin();
        let rule = table.for_manufacturer("Ricoh").unwrap();
        assert!(rule.pattern.is_match("SC542-01 occurs at power on"));
        assert!(!rule.pattern.is_match("C2500 toner"));
    }

    #[test]
    fn test_merge_toml_replaces_and_adds() {
        let mut table = RuleTable::builtin();
        table
            .merge_toml(
                r#"
[[manufacturer]]
manufacturer = "Olivetti"
code_pattern = '\bER\d{3}\b'
context_keywords = ["error", "cause"]
min_confidence = 0.6

[[manufacturer]]
manufacturer = "HP"
code_pattern = '\b\d{2}\.\d{2}\b'
context_keywords = ["error"]
min_confidence = 0.7
"#,
            )
            .unwrap();
        assert!(table.for_manufacturer("Olivetti").is_some());
        let hp = table.for_manufacturer("HP").unwrap();
        assert_eq!(hp.rule.min_confidence, 0.7);
    }

    #[test]
    fn test_merge_rejects_bad_pattern() {
        let mut table = RuleTable::builtin();
        let result = table.merge_toml(
            r#"
[[manufacturer]]
manufacturer = "Broken"
code_pattern = '['
context_keywords = []
min_confidence = 0.5
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_detect_manufacturer() {
        let table = RuleTable::builtin();
        let text = "HP LaserJet Enterprise M607 Service Manual. HP recommends ...";
        let (name, confidence) = detect_manufacturer(&table, text).unwrap();
        assert_eq!(name, "HP");
        assert!(confidence > 0.9);
    }

    #[test]
    fn test_detect_manufacturer_none() {
        let table = RuleTable::builtin();
        assert!(detect_manufacturer(&table, "no vendor names here").is_none());
    }
}
