//! Error types for the retrieval engine.

use thiserror::Error;

/// Failure kinds of the retrieval engine and its service boundary.
///
/// Query-time ranking never produces one of these: an all-zero query or an
/// empty vocabulary hit is a valid, degenerate result rather than an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RagError {
    /// Chunking or indexing parameters violate their constraints.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// There are no chunks to build an index from.
    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,

    /// The persisted index artifact is missing, corrupt, or schema-incompatible.
    #[error("failed to load index: {0}")]
    IndexLoadFailure(String),

    /// The query string was rejected at the service boundary.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type alias for retrieval engine operations.
pub type Result<T> = std::result::Result<T, RagError>;
