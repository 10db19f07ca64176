//! Inbound message types.
//!
//! A [`Message`] is constructed by the transport when a delivery arrives and
//! is then handed through the stage chain to the route handler. Decoding
//! stages may attach a structured `body`; nothing else about the message is
//! rewritten on its way through the pipeline.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A unique identifier for each delivery, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for consecutive
/// deliveries sortable.
///
/// # Example
///
/// ```
/// use conduit_core::DeliveryId;
///
/// let id = DeliveryId::new();
/// println!("Delivery: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Creates a new unique delivery ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `DeliveryId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DeliveryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Broker-level properties attached to a message by its publisher.
///
/// # Example
///
/// ```
/// use conduit_core::MessageProperties;
///
/// let props = MessageProperties::new()
///     .with_content_type("application/json")
///     .with_header("tenant", "acme");
///
/// assert_eq!(props.content_type(), Some("application/json"));
/// assert_eq!(props.header("tenant"), Some("acme"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    content_type: Option<String>,
    content_encoding: Option<String>,
    message_id: Option<String>,
    correlation_id: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl MessageProperties {
    /// Creates an empty property set (no content type).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the content encoding.
    #[must_use]
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    /// Sets the publisher-assigned message ID.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Adds an application header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the declared content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the content encoding, if any.
    #[must_use]
    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    /// Returns the message ID, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Returns the correlation ID, if any.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns a header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns all application headers.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// An inbound message.
///
/// The payload is an opaque, immutable byte sequence. The `body` is absent
/// until a decoding stage parses the payload; a message that was skipped by
/// every decoder still has no body when it reaches the handler.
///
/// # Example
///
/// ```
/// use conduit_core::{Message, MessageProperties};
///
/// let msg = Message::new(r#"{"foo":"bar"}"#)
///     .with_routing_key("orders.created")
///     .with_properties(MessageProperties::new().with_content_type("application/json"));
///
/// assert_eq!(msg.content_type(), Some("application/json"));
/// assert!(!msg.has_body());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    delivery_id: DeliveryId,
    routing_key: String,
    payload: Bytes,
    properties: MessageProperties,
    redelivered: bool,
    body: Option<Value>,
}

impl Message {
    /// Creates a message with the given payload and empty properties.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            delivery_id: DeliveryId::new(),
            routing_key: String::new(),
            payload: payload.into(),
            properties: MessageProperties::default(),
            redelivered: false,
            body: None,
        }
    }

    /// Sets the routing key the message was published with.
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// Replaces the message properties.
    #[must_use]
    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Shorthand for setting only the content type property.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.properties.content_type = Some(content_type.into());
        self
    }

    /// Marks the message as a redelivery.
    #[must_use]
    pub fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Attaches a decoded body.
    ///
    /// Only decoding stages call this. Decoding a message twice is not
    /// supported; register one decoder per content concern.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the delivery ID.
    #[must_use]
    pub fn delivery_id(&self) -> DeliveryId {
        self.delivery_id
    }

    /// Returns the routing key.
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the message properties.
    #[must_use]
    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    /// Returns the declared content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.properties.content_type()
    }

    /// Returns whether the broker flagged this as a redelivery.
    #[must_use]
    pub fn is_redelivered(&self) -> bool {
        self.redelivered
    }

    /// Returns the decoded body, if a decoding stage attached one.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Returns `true` if a decoded body is present.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Deserializes the decoded body into a typed value.
    ///
    /// Returns `None` when no body is attached.
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.body.as_ref().map(|v| T::deserialize(v))
    }
}
