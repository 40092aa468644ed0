//! Unified error types for the domain layer

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Catalog document could not be parsed
    #[error("Catalog error in {document}: {message}")]
    Catalog {
        document: &'static str,
        message: String,
    },
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a catalog error naming the document that failed to load.
    pub fn catalog(document: &'static str, message: impl ToString) -> Self {
        Self::Catalog {
            document,
            message: message.to_string(),
        }
    }
}
