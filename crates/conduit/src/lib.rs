//! # Conduit
//!
//! **Topic-routed message consumers with composable decoding stages**
//!
//! Conduit binds queues to topic patterns on an exchange and runs every
//! delivery through an ordered chain of stages before the route handler sees
//! it. The stock stage is a JSON body decoder that:
//!
//! - skips messages whose content type does not match, leaving them untouched
//! - decodes matching payloads into a structured body
//! - rejects empty or malformed payloads, routing them to the error handler
//!
//! ## Quick Start
//!
//! ```
//! use conduit::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let config = ConfigLoader::new().with_production().load().unwrap();
//!
//! let container = Container::with_config(
//!     MemoryTransport::new(),
//!     config.consumer.to_container_config(),
//! );
//! container.init().unwrap();
//! container.use_stage(json_decoder_with(config.decoder.to_decoder_config().unwrap()));
//!
//! let channel = container
//!     .route("orders.*.created", RouteOptions::new(), |msg: Message| async move {
//!         if let Some(body) = msg.body() {
//!             println!("order {}", body["id"]);
//!         }
//!         Ok(())
//!     })
//!     .ready()
//!     .await
//!     .unwrap();
//!
//! let props = MessageProperties::new().with_content_type("application/json");
//! channel.publish(DEFAULT_EXCHANGE, "orders.eu.created", r#"{"id":7}"#, props).await.unwrap();
//!
//! container.shutdown().await.unwrap();
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Transport → Subscription → global stages → route stages → handler
//!                                   │
//!                                   └── rejection → error handler
//! ```

#![doc(html_root_url = "https://docs.rs/conduit/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Message model and shared errors
pub use conduit_core as core;

// Stage chain and the JSON decoder
pub use conduit_middleware as middleware;

// Container, routes and transports
pub use conduit_server as server;

// Logging and metrics
pub use conduit_telemetry as telemetry;

// Typed configuration
pub use conduit_config as config;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use conduit::prelude::*;
///
/// let msg = Message::new("{}").with_content_type(APPLICATION_JSON);
/// assert!(!msg.has_body());
/// ```
pub mod prelude {
    pub use conduit_core::{ConduitError, ConduitResult, DeliveryId, Message, MessageProperties};

    pub use conduit_middleware::{
        json_decoder, json_decoder_with, BoxFuture, BoxedStage, DecodeError, DecoderConfig,
        FnStage, Pipeline, Stage, StageContext, StageError, StageResult, APPLICATION_JSON,
    };

    pub use conduit_server::{
        Channel, Container, ContainerConfig, HandlerResult, Lifecycle, MemoryTransport,
        RouteError, RouteHandle, RouteOptions, ServerError, ShutdownSignal, Transport,
        DEFAULT_EXCHANGE,
    };

    pub use conduit_telemetry::{init_logging, LogConfig};

    pub use conduit_config::{ConduitConfig, ConfigError, ConfigLoader};
}
