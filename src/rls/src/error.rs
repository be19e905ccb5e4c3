//! Error types for the RLS decision engine

use thiserror::Error;

/// RLS engine errors
#[derive(Debug, Error)]
pub enum RlsError {
    /// Invalid policy definition
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Invalid rule definition
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Invalid validation definition
    #[error("Invalid validation: {0}")]
    InvalidValidation(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for RLS operations
pub type Result<T> = std::result::Result<T, RlsError>;
