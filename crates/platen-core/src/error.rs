//! Error types for platen operations.
//!
//! The pipeline distinguishes failures that belong to a single stage
//! (extraction, model calls, validation) from failures of the state store
//! itself; only the latter abort a whole pipeline run.

use thiserror::Error;

/// Result type alias for platen operations.
pub type PlatenResult<T> = Result<T, PlatenError>;

/// Main error type for all platen operations.
#[derive(Error, Debug)]
pub enum PlatenError {
    /// A stage was invoked before its upstream stages completed.
    #[error("precheck failed for stage '{stage}': upstream stage '{missing}' is not completed")]
    PrecheckFailed {
        /// Stage that was invoked.
        stage: String,
        /// The upstream stage that is not yet completed.
        missing: String,
    },

    /// Extraction produced no usable content.
    #[error("extraction failed: {message}")]
    Extraction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding or generation backend unreachable or errored.
    #[error("model call failed: {message}")]
    ModelCall {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An extracted candidate was rejected (e.g., below confidence threshold).
    #[error("validation failed: {0}")]
    Validation(String),

    /// State or entity persistence failed. Fatal to the pipeline run.
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Blob store operation failed.
    #[error("blob store error: {0}")]
    BlobStore(String),

    /// A named entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stage exceeded its allotted time.
    #[error("stage '{stage}' timed out after {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlatenError {
    /// Create a precheck failure for a stage missing an upstream dependency.
    pub fn precheck(stage: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::PrecheckFailed {
            stage: stage.into(),
            missing: missing.into(),
        }
    }

    /// Create an extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
            source: None,
        }
    }

    /// Create a model-call error.
    pub fn model_call(message: impl Into<String>) -> Self {
        Self::ModelCall {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is fatal to the whole pipeline run rather than
    /// attributable to a single stage or item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

impl From<rusqlite::Error> for PlatenError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precheck_message_names_both_stages() {
        let err = PlatenError::precheck("text-embedding", "chunking");
        let msg = err.to_string();
        assert!(msg.contains("text-embedding"));
        assert!(msg.contains("chunking"));
    }

    #[test]
    fn test_only_storage_is_fatal() {
        assert!(PlatenError::storage("disk full").is_fatal());
        assert!(!PlatenError::extraction("bad page").is_fatal());
        assert!(!PlatenError::model_call("backend down").is_fatal());
    }
}
