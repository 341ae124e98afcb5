//! Storage backends: relational repository and blob store.

mod blob;
mod sqlite;

pub use blob::LocalBlobStore;
pub use sqlite::SqliteRepository;
