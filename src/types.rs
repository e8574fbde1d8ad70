//! Shared error type for the pipeline.

use thiserror::Error;

/// Errors surfaced by the crawl/chunk/enrich/persist pipeline.
///
/// Transient per-chunk failures (a single enrichment call failing) are *not*
/// represented here; those are recorded on the chunk's `error_logs` so that
/// sibling work keeps going. `RagError` is reserved for failures the caller
/// has to handle: missing collaborators, storage faults, fetch errors.
#[derive(Debug, Error)]
pub enum RagError {
    /// Failed to retrieve a page from its origin.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A text-completion or embedding provider call failed or returned an
    /// unusable payload.
    #[error("provider error: {0}")]
    Provider(String),

    /// The document store rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Encoding or decoding a persisted representation failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A required collaborator or setting was not supplied. There is no
    /// runtime fallback for a call that has no collaborator.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}
