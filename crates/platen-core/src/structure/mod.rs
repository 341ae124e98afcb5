//! Structure detection and chunk building.

mod chunker;

pub use chunker::{detect_heading, ChunkBuilder, Heading};
