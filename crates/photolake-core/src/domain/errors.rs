//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly parse failures for identifiers read back from a state document.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid content hash format
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Lake name does not follow the `<prefix>-<suffix>` convention
    #[error("Invalid lake name: {0}")]
    InvalidLakeName(String),

    /// Unknown size variant name
    #[error("Unknown photo size: {0}")]
    UnknownSize(String),

    /// A state document breaks one of its structural rules
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidHash("zzz".to_string());
        assert_eq!(err.to_string(), "Invalid content hash: zzz");

        let err = DomainError::UnknownSize("huge".to_string());
        assert_eq!(err.to_string(), "Unknown photo size: huge");

        let err = DomainError::InconsistentState("no lake".to_string());
        assert_eq!(err.to_string(), "Inconsistent state: no lake");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidId("a".to_string());
        let err2 = DomainError::InvalidId("a".to_string());
        let err3 = DomainError::InvalidId("b".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
