//! # Conduit Middleware
//!
//! The stage pipeline every inbound message passes through before it reaches
//! a route handler, plus the stages Conduit ships with.
//!
//! ## Flow
//!
//! ```text
//! Message → Stage 1 → Stage 2 → ... → Stage N → Handler
//!              │         │              │
//!              └─────────┴──── reject ──┴────→ Error handler
//! ```
//!
//! Stages run strictly in registration order. The first stage that rejects
//! aborts the chain for that message; no later stage sees it.
//!
//! ## Decoding
//!
//! [`JsonDecoder`] is the body-decoding stage. It is gated on the message
//! content type and has three outcomes, see [`DecodeOutcome`]:
//!
//! | Content type        | Payload     | Outcome                 |
//! |---------------------|-------------|-------------------------|
//! | absent / mismatched | anything    | skipped, no body        |
//! | matched or ignored  | valid JSON  | decoded, body attached  |
//! | matched or ignored  | empty       | rejected (`DecodeError`) |
//! | matched or ignored  | malformed   | rejected (`DecodeError`) |
//!
//! ## Example
//!
//! ```
//! use conduit_core::Message;
//! use conduit_middleware::{json_decoder, Pipeline, StageContext};
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder().add_stage(json_decoder()).build();
//!
//! let msg = Message::new(r#"{"foo":"bar"}"#).with_content_type("application/json");
//! let mut ctx = StageContext::for_message(&msg);
//! let decoded = pipeline.run(&mut ctx, msg).await.unwrap();
//!
//! assert_eq!(decoded.body().unwrap()["foo"], "bar");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/conduit-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod content_type;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod stages;

// Re-export main types at crate root
pub use content_type::{ContentTypeMatch, ContentTypeVerdict, APPLICATION_JSON};
pub use context::StageContext;
pub use error::{ContentTypeError, DecodeError, PipelineError, StageError};
pub use pipeline::{BoxedStage, Pipeline, PipelineBuilder};
pub use stage::{BoxFuture, FnStage, Stage, StageResult};
pub use stages::json::{
    json_decoder, json_decoder_with, DecodeOutcome, DecodeReport, DecoderConfig, JsonDecoder,
};
