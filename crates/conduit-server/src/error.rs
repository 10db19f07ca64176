//! Runner error types.

use conduit_core::{ConduitError, DeliveryId, Message};
use conduit_middleware::{PipelineError, StageError};
use std::time::Duration;
use thiserror::Error;

/// Error returned by a message handler.
pub type HandlerError = ConduitError;

/// Result of a message handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors raised by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Publishing to an exchange the transport does not know.
    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),

    /// The queue already has an active consumer.
    #[error("queue '{0}' already has a consumer")]
    QueueInUse(String),

    /// The binding pattern is not usable.
    #[error("invalid binding pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The transport is closed.
    #[error("transport closed")]
    Closed,
}

/// Errors raised by the [`Container`](crate::Container).
#[derive(Debug, Error)]
pub enum ServerError {
    /// A route was declared before `init()`.
    #[error("container is not initialized")]
    NotInitialized,

    /// `init()` was called twice.
    #[error("container is already initialized")]
    AlreadyInitialized,

    /// The container has been shut down.
    #[error("container has been shut down")]
    ShutDown,

    /// The transport refused to bind a route's queue.
    #[error("failed to bind queue '{queue}' to '{pattern}'")]
    Bind {
        /// Queue name.
        queue: String,
        /// Routing pattern.
        pattern: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },

    /// A transport operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The route's setup task ended without reporting readiness.
    #[error("route '{0}' closed before it became ready")]
    RouteClosed(String),

    /// Consumers did not drain before the shutdown timeout.
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

impl ServerError {
    /// Returns the error code for logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::ShutDown => "SHUT_DOWN",
            Self::Bind { .. } => "BIND_FAILED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::RouteClosed(_) => "ROUTE_CLOSED",
            Self::ShutdownTimeout(_) => "SHUTDOWN_TIMEOUT",
        }
    }
}

/// A stage rejection delivered to a route's error handler.
///
/// Carries the route, the failing stage and its error, and the message as it
/// was delivered (before any stage ran).
#[derive(Debug, Error)]
#[error("route '{route}' rejected delivery {delivery_id}: {source}")]
pub struct RouteError {
    route: String,
    delivery_id: DeliveryId,
    #[source]
    source: PipelineError,
    message: Message,
}

impl RouteError {
    pub(crate) fn new(route: impl Into<String>, source: PipelineError, message: Message) -> Self {
        Self {
            route: route.into(),
            delivery_id: message.delivery_id(),
            source,
            message,
        }
    }

    /// Pattern of the route the delivery arrived on.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Name of the stage that rejected the message.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        self.source.stage()
    }

    /// The stage's error.
    #[must_use]
    pub fn error(&self) -> &StageError {
        self.source.stage_error()
    }

    /// Delivery ID of the rejected message.
    #[must_use]
    pub fn delivery_id(&self) -> DeliveryId {
        self.delivery_id
    }

    /// The message as delivered.
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consumes the error, returning the message.
    #[must_use]
    pub fn into_message(self) -> Message {
        self.message
    }
}
