//! In-process topic transport.
//!
//! [`MemoryTransport`] routes published messages to bound queues with topic
//! matching, entirely in memory. It backs the test suite and embedded use;
//! it is not a broker protocol.

use crate::error::TransportError;
use crate::topic::TopicPattern;
use crate::transport::{Subscription, Transport};
use bytes::Bytes;
use conduit_core::{Message, MessageProperties};
use conduit_middleware::BoxFuture;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Name of the default topic exchange.
pub const DEFAULT_EXCHANGE: &str = "amq.topic";

#[derive(Debug)]
struct Binding {
    pattern: TopicPattern,
    sender: mpsc::UnboundedSender<Message>,
}

/// An in-memory topic exchange.
///
/// Clones share the same bindings.
///
/// # Example
///
/// ```
/// use conduit_core::MessageProperties;
/// use conduit_server::{MemoryTransport, Transport};
///
/// # tokio_test::block_on(async {
/// let transport = MemoryTransport::new();
/// let mut sub = transport.bind("audit", "orders.#").await.unwrap();
///
/// let routed = transport
///     .publish("amq.topic", "orders.eu.created", "{}".into(), MessageProperties::new())
///     .await
///     .unwrap();
/// assert_eq!(routed, 1);
/// assert_eq!(sub.next().await.unwrap().routing_key(), "orders.eu.created");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    exchange: Arc<str>,
    bindings: Arc<DashMap<String, Binding>>,
}

impl MemoryTransport {
    /// Creates a transport with the `amq.topic` exchange.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exchange(DEFAULT_EXCHANGE)
    }

    /// Creates a transport whose single exchange has the given name.
    #[must_use]
    pub fn with_exchange(exchange: &str) -> Self {
        Self {
            exchange: Arc::from(exchange),
            bindings: Arc::new(DashMap::new()),
        }
    }

    /// Name of the exchange.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Number of queues with a live consumer.
    #[must_use]
    pub fn bound_queues(&self) -> usize {
        self.bindings
            .iter()
            .filter(|b| !b.value().sender.is_closed())
            .count()
    }

    fn bind_queue(&self, queue: &str, pattern: &str) -> Result<Subscription, TransportError> {
        let pattern = TopicPattern::new(pattern)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let binding = Binding { pattern, sender };

        match self.bindings.entry(queue.to_string()) {
            Entry::Occupied(mut entry) if entry.get().sender.is_closed() => {
                entry.insert(binding);
            }
            Entry::Occupied(_) => return Err(TransportError::QueueInUse(queue.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(binding);
            }
        }

        tracing::debug!(queue, exchange = %self.exchange, "queue bound");
        Ok(Subscription::new(queue, receiver))
    }

    fn route(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &Bytes,
        properties: &MessageProperties,
    ) -> Result<usize, TransportError> {
        if exchange != &*self.exchange {
            return Err(TransportError::UnknownExchange(exchange.to_string()));
        }

        let mut routed = 0;
        for binding in self.bindings.iter() {
            if !binding.pattern.matches(routing_key) {
                continue;
            }
            let message = Message::new(payload.clone())
                .with_routing_key(routing_key)
                .with_properties(properties.clone());
            if binding.sender.send(message).is_ok() {
                routed += 1;
            }
        }

        self.bindings.retain(|_, b| !b.sender.is_closed());
        tracing::trace!(exchange, routing_key, routed, "message published");
        Ok(routed)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn bind<'a>(
        &'a self,
        queue: &'a str,
        pattern: &'a str,
    ) -> BoxFuture<'a, Result<Subscription, TransportError>> {
        Box::pin(async move { self.bind_queue(queue, pattern) })
    }

    fn publish<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &'a str,
        payload: Bytes,
        properties: MessageProperties,
    ) -> BoxFuture<'a, Result<usize, TransportError>> {
        Box::pin(async move { self.route(exchange, routing_key, &payload, &properties) })
    }
}
