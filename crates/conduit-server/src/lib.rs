//! # Conduit Server
//!
//! The pipeline runner: an explicit [`Container`] that owns a broker
//! [`Transport`], a list of global stages, and one consumer task per route.
//!
//! For every delivery a route:
//!
//! 1. runs the message through the global stages registered before the route
//!    was declared, then the route's own stages;
//! 2. on success, calls the route handler with the (possibly enriched) message;
//! 3. on the first stage rejection, skips the handler and passes a
//!    [`RouteError`] to the route's error handler, or logs and drops the
//!    message if there is none.
//!
//! Handler failures are logged and counted; they never reach the error handler.
//!
//! ## Example
//!
//! ```rust,ignore
//! use conduit_middleware::json_decoder;
//! use conduit_server::{Container, MemoryTransport, RouteOptions};
//!
//! let container = Container::new(MemoryTransport::new());
//! container.init()?;
//! container.use_stage(json_decoder());
//!
//! let channel = container
//!     .route(
//!         "jsontest.*.events",
//!         RouteOptions::new()
//!             .queue("jsontest-events")
//!             .error_handler(|err| tracing::warn!(stage = err.stage(), "rejected")),
//!         |msg| async move {
//!             tracing::info!(body = ?msg.body(), "received");
//!             Ok(())
//!         },
//!     )
//!     .ready()
//!     .await?;
//!
//! container.shutdown().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/conduit-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod container;
mod dispatch;
mod error;
mod handler;
mod memory;
pub mod shutdown;
mod topic;
mod transport;

pub use config::{ContainerConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_SHUTDOWN_TIMEOUT};
pub use container::{Channel, Container, Lifecycle, RouteHandle, RouteOptions};
pub use error::{HandlerError, HandlerResult, RouteError, ServerError, TransportError};
pub use handler::{BoxedHandler, ErrorHandler};
pub use memory::{MemoryTransport, DEFAULT_EXCHANGE};
pub use shutdown::{ShutdownReceiver, ShutdownSignal};
pub use topic::TopicPattern;
pub use transport::{Subscription, Transport};
