//! Message handlers and error handlers.

use crate::error::{HandlerResult, RouteError};
use conduit_core::Message;
use conduit_middleware::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A type-erased message handler.
pub type BoxedHandler = Arc<dyn Fn(Message) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Receives stage rejections for a route.
pub type ErrorHandler = Arc<dyn Fn(RouteError) + Send + Sync>;

/// Erases an async handler function.
pub(crate) fn boxed_handler<F, Fut>(handler: F) -> BoxedHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |message| Box::pin(handler(message)))
}
