//! The canonical stage graph.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// One named, ordered step of the ingestion pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Upload,
    TextExtraction,
    Chunking,
    TextEmbedding,
    ImageExtraction,
    VisualEmbedding,
    TableExtraction,
    TableEmbedding,
    ErrorCodeExtraction,
    PartsLinking,
    LinkEnrichment,
    SearchIndexing,
    QualityCheck,
    Thumbnail,
    Done,
}

impl Stage {
    /// All stages in canonical execution order.
    pub fn all() -> Vec<Stage> {
        Stage::iter().collect()
    }

    /// Upstream stages that must be completed (or skipped) before this
    /// one may run.
    pub fn dependencies(&self) -> &'static [Stage] {
        use Stage::*;
        match self {
            Upload => &[],
            TextExtraction => &[Upload],
            Chunking => &[TextExtraction],
            TextEmbedding => &[Chunking],
            ImageExtraction => &[TextExtraction],
            VisualEmbedding => &[ImageExtraction],
            TableExtraction => &[TextExtraction],
            TableEmbedding => &[TableExtraction],
            ErrorCodeExtraction => &[Chunking, ImageExtraction],
            PartsLinking => &[ErrorCodeExtraction],
            LinkEnrichment => &[ErrorCodeExtraction, TableExtraction],
            SearchIndexing => &[TextEmbedding, VisualEmbedding, TableEmbedding],
            QualityCheck => &[SearchIndexing],
            Thumbnail => &[Upload],
            Done => &[QualityCheck, Thumbnail, PartsLinking, LinkEnrichment],
        }
    }

    /// The stage name as persisted and shown to operators.
    pub fn name(&self) -> String {
        self.to_string()
    }
}
