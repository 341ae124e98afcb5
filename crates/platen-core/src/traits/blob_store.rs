//! Blob store trait.
//!
//! Original documents, extracted images, and raster derivatives live in an
//! object store addressed by opaque URLs. The pipeline only needs put/get
//! and short-lived signed URLs for the admin layer.

use async_trait::async_trait;

use crate::error::PlatenResult;

/// Object storage for binary content.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes, returning the blob URL.
    async fn put(&self, bytes: &[u8], content_type: &str) -> PlatenResult<String>;

    /// Fetch bytes by blob URL.
    async fn get(&self, url: &str) -> PlatenResult<Vec<u8>>;

    /// Produce a time-limited URL for external access.
    async fn sign_url(&self, url: &str, expires_secs: u64) -> PlatenResult<String>;
}

/// Rasterization of vector graphics to pixel images.
///
/// External capability: the pipeline treats this as a black box. When no
/// rasterizer is configured, vector graphics are skipped by the visual
/// embedding stage rather than failed.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render vector-graphic bytes (e.g. SVG) to PNG bytes.
    async fn rasterize(&self, bytes: &[u8]) -> PlatenResult<Vec<u8>>;

    /// Render the first page of a document to a thumbnail PNG.
    async fn thumbnail(&self, document_bytes: &[u8], max_width: u32) -> PlatenResult<Vec<u8>>;
}
