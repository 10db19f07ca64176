//! Stage and pipeline error types.

use thiserror::Error;

/// Errors raised when decoding was attempted and the payload did not parse.
///
/// A skipped message (content type absent or not matched) never produces a
/// `DecodeError`.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was empty. An empty byte sequence is never valid JSON.
    #[error("cannot decode empty payload")]
    EmptyPayload,

    /// The payload exceeded the configured size limit.
    #[error("payload of {actual} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Configured maximum size in bytes.
        limit: usize,
        /// Actual payload size in bytes.
        actual: usize,
    },

    /// The payload was not well-formed JSON.
    #[error("malformed JSON payload: {source}")]
    Malformed {
        /// The underlying parser error.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyPayload => "EMPTY_PAYLOAD",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Malformed { .. } => "MALFORMED_PAYLOAD",
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(source: serde_json::Error) -> Self {
        Self::Malformed { source }
    }
}

/// Error returned by a stage that rejects a message.
#[derive(Debug, Error)]
pub enum StageError {
    /// A decoding stage failed to parse the payload.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Any other rejection.
    #[error("{message}")]
    Rejected {
        /// Human-readable reason.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StageError {
    /// Creates a rejection with a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a rejection with an underlying error.
    pub fn rejected_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Rejected {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the decode error if this rejection came from a decoder.
    #[must_use]
    pub fn as_decode_error(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Rejected { .. } => None,
        }
    }

    /// Returns `true` if this is a decode failure.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// A stage rejection, tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("stage '{stage}' rejected message: {source}")]
pub struct PipelineError {
    stage: &'static str,
    #[source]
    source: StageError,
}

impl PipelineError {
    /// Creates a pipeline error for the given stage.
    #[must_use]
    pub fn new(stage: &'static str, source: StageError) -> Self {
        Self { stage, source }
    }

    /// Returns the name of the stage that rejected the message.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Returns the underlying stage error.
    #[must_use]
    pub fn stage_error(&self) -> &StageError {
        &self.source
    }

    /// Consumes the error and returns the underlying stage error.
    #[must_use]
    pub fn into_stage_error(self) -> StageError {
        self.source
    }
}

/// Errors building a content-type matcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentTypeError {
    /// No media types were given.
    #[error("content type matcher requires at least one media type")]
    Empty,

    /// A media type was not of the form `type/subtype`.
    #[error("invalid media type '{value}': expected 'type/subtype'")]
    Invalid {
        /// The rejected value.
        value: String,
    },
}
