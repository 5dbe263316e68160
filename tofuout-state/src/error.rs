//! Error types shared by every stage of an output lookup

use thiserror::Error;

/// Errors that can occur while reading an output from a state
///
/// Every stage maps its failure into exactly one of these variants and stops
/// the lookup. The message is meant for humans; use [`StateError::kind`] to
/// branch on the category.
#[derive(Debug, Error)]
pub enum StateError {
    /// Invalid or contradictory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A state file, database row or output is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed JSON or base64 at a parsing boundary
    #[error("Invalid format: {0}")]
    Format(String),

    /// Authenticated decryption failed
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// File, S3 or database client failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Category of a [`StateError`], without its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    NotFound,
    Format,
    Decryption,
    Backend,
}

impl StateError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create a decryption error
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption(message.into())
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Format(_) => ErrorKind::Format,
            Self::Decryption(_) => ErrorKind::Decryption,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }

    /// The message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::NotFound(m)
            | Self::Format(m)
            | Self::Decryption(m)
            | Self::Backend(m) => m,
        }
    }
}

/// Result type for lookup operations
pub type StateResult<T> = Result<T, StateError>;
