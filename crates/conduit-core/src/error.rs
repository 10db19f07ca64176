//! Error types for Conduit route handlers.
//!
//! [`ConduitError`] is what application handlers return. Stage rejections
//! (such as a payload that fails to decode) have their own error types in
//! `conduit-middleware`; this type covers everything that goes wrong after
//! a message has made it through the stage chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ConduitError`].
pub type ConduitResult<T> = Result<T, ConduitError>;

/// Categories of handler errors, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The decoded body was well-formed but semantically invalid.
    Validation,
    /// A resource referenced by the message does not exist.
    NotFound,
    /// Conflicting state (e.g., an out-of-order event).
    Conflict,
    /// A downstream dependency failed; retrying later may succeed.
    Transient,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Returns the snake_case label for this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Internal => "internal",
        }
    }
}

/// Standard error type for Conduit handlers.
///
/// # Example
///
/// ```
/// use conduit_core::{ConduitError, ErrorCategory};
///
/// fn check_amount(amount: i64) -> Result<(), ConduitError> {
///     if amount < 0 {
///         return Err(ConduitError::validation("amount must be positive"));
///     }
///     Ok(())
/// }
///
/// let err = check_amount(-1).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Validation);
/// ```
#[derive(Error, Debug)]
pub enum ConduitError {
    /// The message content was invalid for this handler.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// The offending field, if known.
        field: Option<String>,
    },

    /// A referenced resource was not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Conflicting state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// A downstream dependency failed.
    #[error("Transient error: {message}")]
    Transient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ConduitError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a transient error with a source.
    pub fn transient(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Transient {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Transient { .. } => ErrorCategory::Transient,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Transient { .. } => "TRANSIENT_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns `true` if redelivering the message could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<serde_json::Error> for ConduitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            message: err.to_string(),
            field: None,
        }
    }
}
