//! Stage context.
//!
//! The [`StageContext`] travels alongside a message through the stage chain.
//! It carries per-delivery bookkeeping (delivery ID, route, timing) and a
//! typed extension map that stages use to leave notes for later stages or
//! for the runner. It is never visible on the message itself.

use conduit_core::{DeliveryId, Message};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-delivery context that flows through the stage chain.
///
/// # Example
///
/// ```
/// use conduit_core::Message;
/// use conduit_middleware::StageContext;
///
/// let msg = Message::new("{}");
/// let ctx = StageContext::for_message(&msg).with_route("orders.*");
///
/// assert_eq!(ctx.delivery_id(), msg.delivery_id());
/// assert_eq!(ctx.route(), Some("orders.*"));
/// ```
#[derive(Debug)]
pub struct StageContext {
    /// Delivery being processed.
    delivery_id: DeliveryId,

    /// Pattern of the route the delivery arrived on.
    route: Option<String>,

    /// Name of the stage currently running.
    current_stage: Option<&'static str>,

    /// When processing started.
    started_at: Instant,

    /// Type-erased extension data.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl StageContext {
    /// Creates a context with a fresh delivery ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_delivery_id(DeliveryId::new())
    }

    /// Creates a context for a specific delivery.
    #[must_use]
    pub fn with_delivery_id(delivery_id: DeliveryId) -> Self {
        Self {
            delivery_id,
            route: None,
            current_stage: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Creates a context bound to the given message's delivery ID.
    #[must_use]
    pub fn for_message(message: &Message) -> Self {
        Self::with_delivery_id(message.delivery_id())
    }

    /// Sets the route pattern.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Returns the delivery ID.
    #[must_use]
    pub fn delivery_id(&self) -> DeliveryId {
        self.delivery_id
    }

    /// Returns the route pattern, if set.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Returns the name of the stage currently running.
    #[must_use]
    pub fn current_stage(&self) -> Option<&'static str> {
        self.current_stage
    }

    /// Records the stage about to run. Called by the pipeline.
    pub(crate) fn enter_stage(&mut self, stage: &'static str) {
        self.current_stage = Some(stage);
    }

    /// Returns when processing started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time elapsed since processing started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_middleware::StageContext;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Tenant(&'static str);
    ///
    /// let mut ctx = StageContext::new();
    /// ctx.set_extension(Tenant("acme"));
    /// assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));
    /// ```
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for StageContext {
    fn default() -> Self {
        Self::new()
    }
}
