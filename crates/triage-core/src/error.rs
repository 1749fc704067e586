//! Error types for the triage console toolkit
//!
//! The pure core (serializer, formatter, key matching) recovers locally and
//! never returns these. They surface only where input is genuinely fallible:
//! building a search format from JSON, reading and writing persisted stores,
//! and CLI input handling.

use thiserror::Error;

/// Result type alias for triage console operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the triage console toolkit
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid search format for field '{field}': {reason}")]
    InvalidFormat { field: String, reason: String },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==========================================================================
    // Internal Errors
    // ==========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidFormat`].
    #[must_use]
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error type string (for JSON output)
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "OS_ERROR",
            Self::Serialization(_) => "TYPE_ERROR",
            Self::Internal(_) => "UNHANDLED_EXCEPTION",
        }
    }

    /// Returns whether the caller can fix the problem by changing its input
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::InvalidFormat { .. }
                | Self::Config(_)
                | Self::Serialization(_)
        )
    }
}
