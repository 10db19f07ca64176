//! The container: lifecycle, stage registration and routes.
//!
//! ```text
//!  use_stage(a)   use_stage(b)   route("x.*", {stages: [c]})   route("y.#")
//!       │              │                  │                        │
//!       ▼              ▼                  ▼                        ▼
//!   global: [a]    global: [a, b]   chain: a → b → c          chain: a → b
//! ```
//!
//! A route captures the global stages registered before it was declared,
//! followed by its own stages. Registering a global stage later does not
//! change routes that already exist.

use crate::config::ContainerConfig;
use crate::dispatch::RouteWorker;
use crate::error::{HandlerResult, RouteError, ServerError};
use crate::handler::{boxed_handler, ErrorHandler};
use crate::shutdown::ShutdownSignal;
use crate::transport::Transport;
use bytes::Bytes;
use conduit_core::{Message, MessageProperties};
use conduit_middleware::{BoxedStage, Pipeline, Stage};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Lifecycle state of a [`Container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created; routes cannot open yet.
    Created,
    /// `init()` has run; routes open as they are declared.
    Running,
    /// `shutdown()` has run.
    Stopped,
}

/// Per-route settings.
///
/// # Example
///
/// ```
/// use conduit_middleware::json_decoder;
/// use conduit_server::RouteOptions;
///
/// let options = RouteOptions::new()
///     .queue("jsontest-events")
///     .stage(json_decoder())
///     .max_concurrent(4)
///     .error_handler(|err| eprintln!("{err}"));
/// ```
#[derive(Clone, Default)]
pub struct RouteOptions {
    queue: Option<String>,
    error_handler: Option<ErrorHandler>,
    stages: Vec<BoxedStage>,
    max_concurrent: Option<usize>,
}

impl RouteOptions {
    /// Options with no queue name, no error handler and no route stages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue name. Defaults to the route pattern.
    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Sets the function that receives stage rejections.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(RouteError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Appends a route-specific stage.
    #[must_use]
    pub fn stage<S: Stage>(self, stage: S) -> Self {
        self.shared_stage(Arc::new(stage))
    }

    /// Appends a route-specific stage that may be registered elsewhere too.
    #[must_use]
    pub fn shared_stage(mut self, stage: BoxedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets how many deliveries this route processes at once.
    #[must_use]
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }
}

impl std::fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOptions")
            .field("queue", &self.queue)
            .field("error_handler", &self.error_handler.is_some())
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

/// A publishing handle onto the container's transport.
#[derive(Clone)]
pub struct Channel {
    transport: Arc<dyn Transport>,
    queue: Option<String>,
}

impl Channel {
    fn new(transport: Arc<dyn Transport>, queue: Option<String>) -> Self {
        Self { transport, queue }
    }

    /// Queue of the route this channel was opened for, if any.
    #[must_use]
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Publishes a payload. Resolves with the number of queues it reached.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the transport refuses the message.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: impl Into<Bytes>,
        properties: MessageProperties,
    ) -> Result<usize, ServerError> {
        let routed = self
            .transport
            .publish(exchange, routing_key, payload.into(), properties)
            .await?;
        Ok(routed)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Returned by [`Container::route`]; resolves once the route is consuming.
#[derive(Debug)]
pub struct RouteHandle {
    pattern: String,
    queue: String,
    ready: oneshot::Receiver<Result<Channel, ServerError>>,
}

impl RouteHandle {
    /// The route pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The queue the route consumes from.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits until the transport has bound the route's queue.
    ///
    /// # Errors
    ///
    /// - [`ServerError::NotInitialized`] if the route was declared before `init()`
    /// - [`ServerError::ShutDown`] if it was declared after `shutdown()`
    /// - [`ServerError::Bind`] if the transport refused the binding
    pub async fn ready(self) -> Result<Channel, ServerError> {
        let Self { pattern, ready, .. } = self;
        ready
            .await
            .unwrap_or_else(|_| Err(ServerError::RouteClosed(pattern)))
    }
}

struct State {
    lifecycle: Lifecycle,
    global_stages: Vec<BoxedStage>,
    consumers: Vec<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: ContainerConfig,
    shutdown: ShutdownSignal,
    state: Mutex<State>,
}

/// Owns the transport, the global stage list and every route consumer.
///
/// Cloning a container yields another handle to the same instance.
///
/// # Example
///
/// ```
/// use conduit_core::MessageProperties;
/// use conduit_middleware::json_decoder;
/// use conduit_server::{Container, MemoryTransport, RouteOptions};
///
/// # tokio_test::block_on(async {
/// let container = Container::new(MemoryTransport::new());
/// container.init().unwrap();
/// container.use_stage(json_decoder());
///
/// let channel = container
///     .route("orders.*", RouteOptions::new(), |msg| async move {
///         println!("{:?}", msg.body());
///         Ok(())
///     })
///     .ready()
///     .await
///     .unwrap();
///
/// channel
///     .publish(
///         "amq.topic",
///         "orders.created",
///         r#"{"id":1}"#,
///         MessageProperties::new().with_content_type("application/json"),
///     )
///     .await
///     .unwrap();
///
/// container.shutdown().await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Creates a container with default settings.
    pub fn new<T: Transport>(transport: T) -> Self {
        Self::with_config(transport, ContainerConfig::default())
    }

    /// Creates a container with the given settings.
    pub fn with_config<T: Transport>(transport: T, config: ContainerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                config,
                shutdown: ShutdownSignal::new(),
                state: Mutex::new(State {
                    lifecycle: Lifecycle::Created,
                    global_stages: Vec::new(),
                    consumers: Vec::new(),
                }),
            }),
        }
    }

    /// Moves the container to [`Lifecycle::Running`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyInitialized`] on a second call and
    /// [`ServerError::ShutDown`] after shutdown.
    pub fn init(&self) -> Result<(), ServerError> {
        let mut state = self.inner.state.lock();
        match state.lifecycle {
            Lifecycle::Created => {
                state.lifecycle = Lifecycle::Running;
                conduit_telemetry::metrics::describe_metrics();
                tracing::info!(
                    global_stages = state.global_stages.len(),
                    "container initialized"
                );
                Ok(())
            }
            Lifecycle::Running => Err(ServerError::AlreadyInitialized),
            Lifecycle::Stopped => Err(ServerError::ShutDown),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// The shared shutdown signal.
    #[must_use]
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.inner.shutdown
    }

    /// Appends a global stage. It applies to routes declared afterwards.
    pub fn use_stage<S: Stage>(&self, stage: S) -> &Self {
        self.use_shared(Arc::new(stage))
    }

    /// Appends a global stage that may be registered elsewhere too.
    pub fn use_shared(&self, stage: BoxedStage) -> &Self {
        let mut state = self.inner.state.lock();
        tracing::debug!(
            stage = stage.name(),
            position = state.global_stages.len(),
            "global stage registered"
        );
        state.global_stages.push(stage);
        self
    }

    /// Names of the global stages, in order.
    #[must_use]
    pub fn global_stage_names(&self) -> Vec<&'static str> {
        self.inner
            .state
            .lock()
            .global_stages
            .iter()
            .map(|s| s.name())
            .collect()
    }

    /// Returns a channel for publishing outside any route.
    #[must_use]
    pub fn channel(&self) -> Channel {
        Channel::new(Arc::clone(&self.inner.transport), None)
    }

    /// Declares a route: binds a queue to `pattern` and runs every delivery
    /// through the global stages, the route's stages, then `handler`.
    ///
    /// Must be called inside a tokio runtime. Binding happens in the
    /// background; await [`RouteHandle::ready`] to know when it completed.
    pub fn route<F, Fut>(&self, pattern: &str, options: RouteOptions, handler: F) -> RouteHandle
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let (tx, ready) = oneshot::channel();
        let RouteOptions {
            queue,
            error_handler,
            stages,
            max_concurrent,
        } = options;
        let queue = queue.unwrap_or_else(|| pattern.to_string());
        let handle = RouteHandle {
            pattern: pattern.to_string(),
            queue: queue.clone(),
            ready,
        };

        let mut state = self.inner.state.lock();
        let refusal = match state.lifecycle {
            Lifecycle::Created => Some(ServerError::NotInitialized),
            Lifecycle::Stopped => Some(ServerError::ShutDown),
            Lifecycle::Running => None,
        };
        if let Some(err) = refusal {
            tracing::warn!(route = pattern, error = %err, "route declared while not running");
            let _ = tx.send(Err(err));
            return handle;
        }

        let pipeline = state
            .global_stages
            .iter()
            .chain(stages.iter())
            .cloned()
            .fold(Pipeline::builder(), |builder, stage| builder.add_shared(stage))
            .build();
        let stage_names = pipeline.stage_names();

        let worker = RouteWorker::new(
            pattern.to_string(),
            pipeline,
            boxed_handler(handler),
            error_handler,
            max_concurrent.unwrap_or(self.inner.config.max_concurrent),
        );

        let transport = Arc::clone(&self.inner.transport);
        let shutdown = self.inner.shutdown.clone();
        let pattern = pattern.to_string();

        let consumer = tokio::spawn(async move {
            let subscription = match transport.bind(&queue, &pattern).await {
                Ok(subscription) => subscription,
                Err(source) => {
                    tracing::error!(
                        route = %pattern,
                        queue = %queue,
                        error = %source,
                        "failed to bind route"
                    );
                    let _ = tx.send(Err(ServerError::Bind {
                        queue,
                        pattern,
                        source,
                    }));
                    return;
                }
            };

            tracing::info!(route = %pattern, queue = %queue, stages = ?stage_names, "route ready");
            let _ = tx.send(Ok(Channel::new(Arc::clone(&transport), Some(queue))));
            worker.run(subscription, shutdown).await;
        });

        state.consumers.push(consumer);
        handle
    }

    /// Stops every route and waits for in-flight deliveries to finish.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ShutdownTimeout`] if consumers have not drained
    /// within the configured timeout. They keep running detached.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        let consumers = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Stopped {
                return Ok(());
            }
            state.lifecycle = Lifecycle::Stopped;
            std::mem::take(&mut state.consumers)
        };

        tracing::info!(routes = consumers.len(), "shutting down");
        self.inner.shutdown.trigger();

        let timeout = self.inner.config.shutdown_timeout;
        let Ok(results) = tokio::time::timeout(timeout, join_all(consumers)).await else {
            tracing::warn!(timeout = ?timeout, "consumers did not drain in time");
            return Err(ServerError::ShutdownTimeout(timeout));
        };

        for result in results {
            if let Err(e) = result {
                tracing::error!(error = %e, "route consumer ended abnormally");
            }
        }

        tracing::info!("shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Container")
            .field("lifecycle", &state.lifecycle)
            .field("global_stages", &state.global_stages.len())
            .field("routes", &state.consumers.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTransport;
    use conduit_middleware::{json_decoder, FnStage};

    fn noop(name: &'static str) -> BoxedStage {
        Arc::new(FnStage::new(name, |msg: Message| async move { Ok(msg) }))
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let container = Container::new(MemoryTransport::new());
        assert_eq!(container.lifecycle(), Lifecycle::Created);

        container.init().unwrap();
        assert_eq!(container.lifecycle(), Lifecycle::Running);
        assert!(matches!(container.init(), Err(ServerError::AlreadyInitialized)));

        container.shutdown().await.unwrap();
        assert_eq!(container.lifecycle(), Lifecycle::Stopped);
        assert!(container.shutdown_signal().is_shutdown());
        assert!(matches!(container.init(), Err(ServerError::ShutDown)));

        container.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_route_before_init_is_refused() {
        let container = Container::new(MemoryTransport::new());
        let handle = container.route("a.*", RouteOptions::new(), |_msg| async { Ok(()) });
        assert_eq!(handle.pattern(), "a.*");
        assert_eq!(handle.queue(), "a.*");
        assert!(matches!(handle.ready().await, Err(ServerError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_route_after_shutdown_is_refused() {
        let container = Container::new(MemoryTransport::new());
        container.init().unwrap();
        container.shutdown().await.unwrap();

        let handle = container.route("a.*", RouteOptions::new(), |_msg| async { Ok(()) });
        assert!(matches!(handle.ready().await, Err(ServerError::ShutDown)));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let container = Container::new(MemoryTransport::new());
        container.init().unwrap();

        let first = container.route("a.*", RouteOptions::new().queue("q"), |_msg| async { Ok(()) });
        first.ready().await.unwrap();

        let second = container.route("b.*", RouteOptions::new().queue("q"), |_msg| async { Ok(()) });
        let err = second.ready().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { ref queue, .. } if queue == "q"));

        container.shutdown().await.unwrap();
    }

    #[test]
    fn test_global_stage_registration_order() {
        let container = Container::new(MemoryTransport::new());
        container.use_stage(json_decoder()).use_shared(noop("audit"));
        assert_eq!(container.global_stage_names(), vec!["json_decode", "audit"]);
    }

    #[test]
    fn test_route_options_debug() {
        let options = RouteOptions::new()
            .queue("q")
            .shared_stage(noop("audit"))
            .max_concurrent(2);
        let debug = format!("{options:?}");
        assert!(debug.contains("audit"));
        assert!(debug.contains("error_handler: false"));
    }

    #[tokio::test]
    async fn test_channel_without_route_publishes() {
        let transport = MemoryTransport::new();
        let mut sub = transport.bind("q", "a.b").await.unwrap();
        let container = Container::new(transport);

        let channel = container.channel();
        assert!(channel.queue().is_none());
        let routed = channel
            .publish("amq.topic", "a.b", "hi", MessageProperties::new())
            .await
            .unwrap();
        assert_eq!(routed, 1);
        assert_eq!(sub.next().await.unwrap().payload().as_ref(), b"hi");
    }
}
