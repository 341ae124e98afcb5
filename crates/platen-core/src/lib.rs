//! platen-core - Document ingestion and multi-modal indexing pipeline.
//!
//! Ingests technical manuals (service manuals, parts catalogs) and drives
//! them through a staged pipeline: raw extraction, structure-aware
//! chunking, manufacturer-scoped entity extraction, and multi-modal
//! embedding, with per-stage state that makes every run resumable and
//! idempotent.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use platen_core::config::PipelineConfig;
//! use platen_core::pipeline::PipelineController;
//! use platen_core::storage::{LocalBlobStore, SqliteRepository};
//!
//! let config = PipelineConfig::default();
//! let repository = Arc::new(SqliteRepository::new(&config.db_path)?);
//! let blob_store = Arc::new(LocalBlobStore::new(&config.blob_root));
//! let controller = PipelineController::new(
//!     config, repository, blob_store, embedder, Some(visual), None,
//! )?;
//!
//! let doc = controller.ingest("m607-service.pdf", &bytes).await?;
//! let results = controller.run_missing(&doc.id).await?;
//! ```

pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod pipeline;
pub mod storage;
pub mod structure;
pub mod traits;
pub mod types;

pub use error::{PlatenError, PlatenResult};
pub use pipeline::{PipelineController, Stage, StageResult};
