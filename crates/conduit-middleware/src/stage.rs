//! Core stage trait and types.
//!
//! A [`Stage`] is one asynchronous transform in the chain a message passes
//! through before its handler runs. A stage either resolves with a message
//! (the same one, or an enriched one) or rejects it with a [`StageError`].
//!
//! # Example
//!
//! ```
//! use conduit_core::Message;
//! use conduit_middleware::{BoxFuture, Stage, StageContext, StageError, StageResult};
//!
//! struct RequireTenant;
//!
//! impl Stage for RequireTenant {
//!     fn name(&self) -> &'static str {
//!         "require_tenant"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         _ctx: &'a mut StageContext,
//!         message: Message,
//!     ) -> BoxFuture<'a, StageResult> {
//!         Box::pin(async move {
//!             if message.properties().header("tenant").is_none() {
//!                 return Err(StageError::rejected("tenant header missing"));
//!             }
//!             Ok(message)
//!         })
//!     }
//! }
//! ```

use crate::context::StageContext;
use crate::error::StageError;
use conduit_core::Message;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The result of running a stage.
pub type StageResult = Result<Message, StageError>;

/// The core stage trait.
///
/// # Invariants
///
/// - A stage MUST NOT block the executor; suspend instead
/// - A stage that rejects MUST NOT swallow the cause; return it as the error
/// - A stage that does not apply to a message MUST resolve with it unchanged
pub trait Stage: Send + Sync + 'static {
    /// Returns the name of this stage, used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Processes a message.
    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        message: Message,
    ) -> BoxFuture<'a, StageResult>;
}

impl<S: Stage + ?Sized> Stage for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        message: Message,
    ) -> BoxFuture<'a, StageResult> {
        (**self).process(ctx, message)
    }
}

/// A stage built from an async function of the message.
///
/// # Example
///
/// ```
/// use conduit_middleware::{FnStage, StageError};
///
/// let stage = FnStage::new("drop_redeliveries", |msg: conduit_core::Message| async move {
///     if msg.is_redelivered() {
///         Err(StageError::rejected("redelivery"))
///     } else {
///         Ok(msg)
///     }
/// });
/// ```
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F> FnStage<F> {
    /// Creates a new function-based stage.
    pub fn new<Fut>(name: &'static str, func: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StageResult> + Send + 'static,
    {
        Self { name, func }
    }
}

impl<F> std::fmt::Debug for FnStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        _ctx: &'a mut StageContext,
        message: Message,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin((self.func)(message))
    }
}
