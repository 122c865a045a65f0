//! Error taxonomy for the indexing engine.
//!
//! Every fallible engine operation returns [`Result`]. Per-file problems
//! during a scan are *not* errors at this level: they are absorbed by the
//! scanner and reported through [`ScanSummary::errors`](crate::models::ScanSummary).

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A collection, document, or content blob does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A collection with this name is already registered.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// Malformed query, bad pattern, or a collection root that is not a directory.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store I/O or corruption. The enclosing transaction was rolled back.
    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding capability could not produce a vector.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Stable short code used by front ends to render the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::AlreadyExists { .. } => "already_exists",
            Error::InvalidInput(_) => "invalid_input",
            Error::Storage(_) | Error::Io(_) => "storage",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
        }
    }

    /// True for errors a front end should present as a rejected request
    /// rather than an operational failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::AlreadyExists { .. } | Error::InvalidInput(_)
        )
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(Error::not_found("collection", "docs").kind(), "not_found");
        assert_eq!(
            Error::already_exists("collection", "docs").kind(),
            "already_exists"
        );
        assert_eq!(Error::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(
            Error::EmbeddingUnavailable("down".into()).kind(),
            "embedding_unavailable"
        );
    }

    #[test]
    fn test_display_names_the_missing_thing() {
        let err = Error::not_found("document", "docs/a.md");
        assert_eq!(err.to_string(), "document not found: docs/a.md");
        assert!(err.is_rejection());
        assert!(!Error::Storage(sqlx::Error::PoolTimedOut).is_rejection());
    }
}
