//! Shared error type for the ingestion and retrieval pipeline.

use thiserror::Error;

/// Errors surfaced by the ragline pipeline.
///
/// Configuration problems fail before any partial work happens; an
/// unavailable dependency (embedding model, cache store) fails the operation
/// in progress rather than degrading to empty results; store-level
/// rejections propagate unchanged. None of these are retried here; retry
/// policy, if any, belongs to the caller.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration: bad chunking or batching parameters, a missing
    /// source file, a malformed collection name.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The source document set could not be parsed.
    #[error("invalid source document: {0}")]
    InvalidDocument(String),

    /// The embedding provider failed or returned a malformed response.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The embedding cache store could not be opened, read, or written.
    /// Distinct from a cache miss, which is `Ok(None)`.
    #[error("embedding cache error: {0}")]
    Cache(String),

    /// The vector store rejected an operation.
    #[error("vector store error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
