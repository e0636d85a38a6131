//! Common error types for the question staging pipeline

use thiserror::Error;

/// Common result type for staging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by all pipeline crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested batch, question, or duplicate record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Status change rejected by the workflow transition table
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Operation conflicts with current state (e.g. nothing approved to import)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bounded identifier retries exceeded for one id prefix
    #[error("Identifier sequence exhausted for prefix '{prefix}' after {attempts} attempts")]
    SequenceExhausted { prefix: String, attempts: u32 },

    /// Fallback duplicate scan failed (the primary path falls back silently)
    #[error("Duplicate detection failed: {0}")]
    DuplicateDetection(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the store rejected a write because of a UNIQUE constraint.
    ///
    /// Write-time id conflicts are expected and retryable; the caller bumps
    /// the sequence and tries again rather than treating this as fatal.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }

    /// True when the store reported a missing row rather than a data error.
    pub fn is_row_not_found(&self) -> bool {
        matches!(self, Error::Database(sqlx::Error::RowNotFound)) || matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_classification_ignores_other_variants() {
        let err = Error::Conflict("duplicate id".into());
        assert!(!err.is_unique_violation());

        let err = Error::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_unique_violation());
        assert!(err.is_row_not_found());
    }
}
