//! platen-extractors - Raw content extraction for the ingestion pipeline.
//!
//! Turns uploaded bytes into pages, tables, and embedded images behind a
//! unified trait-based interface with MIME routing.
//!
//! # Features
//!
//! - `pdf` (default) - PDF text extraction via pdf-extract
//!
//! # Example
//!
//! ```ignore
//! use platen_extractors::ExtractionRouter;
//!
//! let router = ExtractionRouter::with_defaults();
//! let doc = router.extract(&pdf_bytes, "application/pdf").await?;
//! println!("{} pages, {} tables", doc.pages.len(), doc.tables.len());
//! ```

mod error;
mod factory;
mod pipeline;
pub mod tables;
mod text;
mod types;

#[cfg(feature = "pdf")]
mod pdf;

pub use error::{ExtractError, ExtractResult};
pub use factory::ExtractorFactory;
pub use pipeline::ExtractionRouter;
pub use text::TextExtractor;
pub use types::{ExtractedDocument, PageRecord, RawImage, RawTable};

#[cfg(feature = "pdf")]
pub use pdf::PdfExtractor;

use async_trait::async_trait;

/// Core Extractor trait - all content extractors implement this.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract structured content from raw bytes.
    async fn extract(&self, content: &[u8]) -> ExtractResult<ExtractedDocument>;

    /// Supported MIME types for this extractor.
    fn supported_types(&self) -> &[&str];

    /// Check if this extractor handles the given MIME type.
    fn supports(&self, mime_type: &str) -> bool {
        self.supported_types().contains(&mime_type)
    }

    /// Human-readable name for this extractor.
    fn name(&self) -> &str;
}
