//! JSON body decoding stage.
//!
//! The decoder parses a message payload as JSON and attaches the result as
//! the message body. It is gated on the message content type:
//!
//! 1. Unless `ignore_content_type` is set, a message whose content type is
//!    absent or not accepted by the matcher is **skipped**: it resolves
//!    unchanged, with no body.
//! 2. Otherwise the payload is parsed strictly. Empty payloads, oversized
//!    payloads, trailing data and malformed documents all **fail** with a
//!    [`DecodeError`].
//! 3. A well-formed payload is **decoded** and attached as the body.
//!
//! The decoder holds no mutable state; one instance can be shared by any
//! number of routes and concurrent deliveries.

use crate::content_type::{ContentTypeMatch, ContentTypeVerdict};
use crate::context::StageContext;
use crate::error::{DecodeError, StageError};
use crate::stage::{BoxFuture, Stage, StageResult};
use conduit_core::Message;
use serde_json::Value;

/// Configuration for [`JsonDecoder`].
///
/// # Example
///
/// ```
/// use conduit_middleware::{ContentTypeMatch, DecoderConfig};
///
/// let config = DecoderConfig::new()
///     .with_content_type_match(
///         ContentTypeMatch::new(["application/json", "application/vnd.api+json"]).unwrap(),
///     )
///     .with_max_payload_size(64 * 1024);
///
/// assert!(!config.ignore_content_type);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Content types the decoder accepts.
    pub content_type_match: ContentTypeMatch,

    /// When `true`, decoding is attempted regardless of content type.
    pub ignore_content_type: bool,

    /// Optional payload size limit in bytes.
    pub max_payload_size: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            content_type_match: ContentTypeMatch::json(),
            ignore_content_type: false,
            max_payload_size: None,
        }
    }
}

impl DecoderConfig {
    /// Creates the default configuration: accept `application/json` only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the accepted content types.
    #[must_use]
    pub fn with_content_type_match(mut self, matcher: ContentTypeMatch) -> Self {
        self.content_type_match = matcher;
        self
    }

    /// Sets whether the content-type check is bypassed.
    #[must_use]
    pub fn with_ignore_content_type(mut self, ignore: bool) -> Self {
        self.ignore_content_type = ignore;
        self
    }

    /// Sets the payload size limit.
    #[must_use]
    pub fn with_max_payload_size(mut self, limit: usize) -> Self {
        self.max_payload_size = Some(limit);
        self
    }
}

/// The result of a decode attempt.
#[derive(Debug)]
#[must_use]
pub enum DecodeOutcome {
    /// Decoding did not apply to this message. Not an error.
    Skipped(ContentTypeVerdict),
    /// The payload parsed.
    Decoded(Value),
    /// Decoding was attempted and failed.
    Failed(DecodeError),
}

impl DecodeOutcome {
    /// Returns `true` if decoding was skipped.
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Returns `true` if the payload was decoded.
    pub const fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }

    /// Returns `true` if decoding failed.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the report kind for this outcome.
    pub const fn report(&self) -> DecodeReport {
        match self {
            Self::Skipped(_) => DecodeReport::Skipped,
            Self::Decoded(_) => DecodeReport::Decoded,
            Self::Failed(_) => DecodeReport::Failed,
        }
    }
}

/// A summary of the decode outcome, left in the [`StageContext`] for the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeReport {
    /// Decoding was skipped.
    Skipped,
    /// The payload was decoded.
    Decoded,
    /// Decoding failed.
    Failed,
}

impl DecodeReport {
    /// Returns the metrics label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Decoded => "decoded",
            Self::Failed => "failed",
        }
    }
}

/// Content-type gated JSON decoding stage.
///
/// # Example
///
/// ```
/// use conduit_core::Message;
/// use conduit_middleware::json_decoder;
///
/// # tokio_test::block_on(async {
/// let decoder = json_decoder();
///
/// let json = Message::new(r#"{"foo":"bar"}"#).with_content_type("application/json");
/// assert_eq!(decoder.apply(json).await.unwrap().body().unwrap()["foo"], "bar");
///
/// let text = Message::new("Hello world!").with_content_type("application/text");
/// assert!(!decoder.apply(text).await.unwrap().has_body());
///
/// let empty = Message::new("").with_content_type("application/json");
/// assert!(decoder.apply(empty).await.is_err());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    config: DecoderConfig,
}

impl JsonDecoder {
    /// Creates a decoder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with the given configuration.
    #[must_use]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decides what to do with a message and, if applicable, parses it.
    ///
    /// This is the whole decision procedure; [`Stage::process`] and
    /// [`JsonDecoder::apply`] only map its outcome onto a message.
    pub fn decode(&self, message: &Message) -> DecodeOutcome {
        if !self.config.ignore_content_type {
            let verdict = self.config.content_type_match.check(message.content_type());
            if !verdict.is_match() {
                return DecodeOutcome::Skipped(verdict);
            }
        }

        let payload = message.payload();
        if payload.is_empty() {
            return DecodeOutcome::Failed(DecodeError::EmptyPayload);
        }

        if let Some(limit) = self.config.max_payload_size {
            if payload.len() > limit {
                return DecodeOutcome::Failed(DecodeError::PayloadTooLarge {
                    limit,
                    actual: payload.len(),
                });
            }
        }

        match serde_json::from_slice::<Value>(payload) {
            Ok(value) => DecodeOutcome::Decoded(value),
            Err(source) => DecodeOutcome::Failed(DecodeError::Malformed { source }),
        }
    }

    /// Decodes a message: resolves with it (enriched or unchanged) or
    /// rejects with a [`DecodeError`].
    pub async fn apply(&self, message: Message) -> Result<Message, DecodeError> {
        match self.decode(&message) {
            DecodeOutcome::Skipped(_) => Ok(message),
            DecodeOutcome::Decoded(body) => Ok(message.with_body(body)),
            DecodeOutcome::Failed(err) => Err(err),
        }
    }
}

impl Stage for JsonDecoder {
    fn name(&self) -> &'static str {
        "json_decode"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        message: Message,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let outcome = self.decode(&message);
            ctx.set_extension(outcome.report());

            match outcome {
                DecodeOutcome::Skipped(_) => Ok(message),
                DecodeOutcome::Decoded(body) => Ok(message.with_body(body)),
                DecodeOutcome::Failed(err) => Err(StageError::Decode(err)),
            }
        })
    }
}

/// Creates a JSON decoder with the default configuration.
#[must_use]
pub fn json_decoder() -> JsonDecoder {
    JsonDecoder::new()
}

/// Creates a JSON decoder with the given configuration.
#[must_use]
pub fn json_decoder_with(config: DecoderConfig) -> JsonDecoder {
    JsonDecoder::with_config(config)
}
