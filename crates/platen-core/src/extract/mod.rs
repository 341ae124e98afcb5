//! Manufacturer-aware entity extraction.

mod error_codes;
mod oem;
mod parts;
mod rules;

pub use error_codes::ErrorCodeExtractor;
pub use oem::OemResolver;
pub use parts::{find_parts, find_parts_near};
pub use rules::{detect_manufacturer, CompiledRule, ManufacturerRule, RuleTable};
