//! Per-route consumer loop.
//!
//! Each route runs one consumer task. The task takes a concurrency permit,
//! then a delivery, and spawns the delivery's processing with the permit
//! attached. On shutdown it stops taking deliveries and waits until every
//! permit has been returned.

use crate::error::RouteError;
use crate::handler::{BoxedHandler, ErrorHandler};
use crate::shutdown::ShutdownSignal;
use crate::transport::Subscription;
use conduit_core::Message;
use conduit_middleware::{DecodeReport, Pipeline, PipelineError, StageContext};
use conduit_telemetry::metrics::{self, MessageOutcome};
use conduit_telemetry::InFlightGuard;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Upper bound on per-route concurrency.
pub(crate) const MAX_ROUTE_CONCURRENCY: usize = 65_536;

pub(crate) struct RouteWorker {
    route: String,
    pipeline: Pipeline,
    handler: BoxedHandler,
    error_handler: Option<ErrorHandler>,
    limit: Arc<Semaphore>,
    max_concurrent: u32,
}

impl RouteWorker {
    pub(crate) fn new(
        route: String,
        pipeline: Pipeline,
        handler: BoxedHandler,
        error_handler: Option<ErrorHandler>,
        max_concurrent: usize,
    ) -> Self {
        let permits = max_concurrent.clamp(1, MAX_ROUTE_CONCURRENCY);
        Self {
            route,
            pipeline,
            handler,
            error_handler,
            limit: Arc::new(Semaphore::new(permits)),
            max_concurrent: u32::try_from(permits).unwrap_or(1),
        }
    }

    /// Consumes `subscription` until shutdown or until the transport closes it.
    pub(crate) async fn run(self, mut subscription: Subscription, shutdown: ShutdownSignal) {
        let worker = Arc::new(self);
        let mut stop = shutdown.recv();

        loop {
            let permit = tokio::select! {
                biased;
                () = &mut stop => break,
                permit = Arc::clone(&worker.limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                biased;
                () = &mut stop => break,
                message = subscription.next() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let task = Arc::clone(&worker);
            tokio::spawn(async move {
                task.dispatch(message).await;
                drop(permit);
            });
        }

        let queue = subscription.queue().to_string();
        drop(subscription);

        // Every permit back means no delivery is still in flight.
        if worker.limit.acquire_many(worker.max_concurrent).await.is_err() {
            tracing::warn!(route = %worker.route, "concurrency limiter closed during drain");
        }
        tracing::info!(route = %worker.route, queue = %queue, "consumer stopped");
    }

    async fn dispatch(&self, message: Message) {
        let _in_flight = InFlightGuard::new(&self.route);
        let delivery_id = message.delivery_id();
        let mut ctx = StageContext::for_message(&message).with_route(self.route.as_str());

        let result = self.pipeline.run(&mut ctx, message.clone()).await;
        metrics::record_stage_duration(&self.route, ctx.elapsed());

        if let Some(report) = ctx.get_extension::<DecodeReport>() {
            metrics::record_decode(report.as_str());
            tracing::debug!(
                delivery_id = %delivery_id,
                route = %self.route,
                outcome = report.as_str(),
                "decoder finished"
            );
        }

        match result {
            Ok(decoded) => self.handle(decoded).await,
            Err(error) => self.reject(error, message),
        }
    }

    async fn handle(&self, message: Message) {
        let delivery_id = message.delivery_id();
        match (self.handler)(message).await {
            Ok(()) => {
                metrics::record_message(&self.route, MessageOutcome::Handled);
                tracing::debug!(delivery_id = %delivery_id, route = %self.route, "message handled");
            }
            Err(error) => {
                metrics::record_message(&self.route, MessageOutcome::HandlerFailed);
                tracing::error!(
                    delivery_id = %delivery_id,
                    route = %self.route,
                    code = error.error_code(),
                    error = %error,
                    "handler failed"
                );
            }
        }
    }

    fn reject(&self, error: PipelineError, message: Message) {
        metrics::record_message(&self.route, MessageOutcome::Rejected);

        if let Some(error_handler) = &self.error_handler {
            tracing::debug!(
                delivery_id = %message.delivery_id(),
                route = %self.route,
                stage = error.stage(),
                "stage rejected message, calling error handler"
            );
            error_handler(RouteError::new(self.route.as_str(), error, message));
        } else {
            tracing::warn!(
                delivery_id = %message.delivery_id(),
                route = %self.route,
                stage = error.stage(),
                error = %error.stage_error(),
                "stage rejected message, dropping"
            );
        }
    }
}
