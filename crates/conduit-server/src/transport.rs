//! The broker seam.
//!
//! A [`Transport`] binds queues to routing patterns and publishes messages.
//! The runner only talks to brokers through this trait; wire framing,
//! reconnects and acknowledgements belong to the implementation.

use crate::error::TransportError;
use bytes::Bytes;
use conduit_core::{Message, MessageProperties};
use conduit_middleware::BoxFuture;
use tokio::sync::mpsc;

/// A message broker connection.
pub trait Transport: Send + Sync + 'static {
    /// Binds `queue` to `pattern` and starts consuming from it.
    fn bind<'a>(
        &'a self,
        queue: &'a str,
        pattern: &'a str,
    ) -> BoxFuture<'a, Result<Subscription, TransportError>>;

    /// Publishes a payload to `exchange` with `routing_key`.
    ///
    /// Resolves with the number of queues the message was routed to.
    fn publish<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &'a str,
        payload: Bytes,
        properties: MessageProperties,
    ) -> BoxFuture<'a, Result<usize, TransportError>>;
}

/// A stream of deliveries from one bound queue.
///
/// Dropping the subscription stops consumption.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    /// Wraps a delivery channel.
    #[must_use]
    pub fn new(queue: impl Into<String>, receiver: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            queue: queue.into(),
            receiver,
        }
    }

    /// Name of the bound queue.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for the next delivery. `None` once the transport side closes.
    pub async fn next(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Returns a delivery if one is already waiting.
    pub fn try_next(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}
