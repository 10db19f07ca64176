//! End-to-end tests: publish through the in-memory transport and observe
//! what route handlers and error handlers receive.

use conduit_core::{ConduitError, Message, MessageProperties};
use conduit_middleware::{json_decoder, json_decoder_with, DecoderConfig, FnStage, StageError};
use conduit_server::{
    Channel, Container, ContainerConfig, MemoryTransport, RouteError, RouteOptions, ServerError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const EXCHANGE: &str = "amq.topic";
const WAIT: Duration = Duration::from_secs(2);

fn json_props() -> MessageProperties {
    MessageProperties::new().with_content_type("application/json")
}

fn running_container() -> Container {
    let container = Container::new(MemoryTransport::new());
    container.init().unwrap();
    container
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("channel closed")
}

async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "unexpected delivery: {got:?}");
}

/// Declares a route whose handler forwards every message into a channel.
async fn forwarding_route(
    container: &Container,
    pattern: &str,
    options: RouteOptions,
) -> (Channel, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let channel = container
        .route(pattern, options, move |msg| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(msg);
                Ok(())
            }
        })
        .ready()
        .await
        .unwrap();
    (channel, rx)
}

fn forwarding_error_handler() -> (
    impl Fn(RouteError) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<RouteError>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |err: RouteError| {
            let _ = tx.send(err);
        },
        rx,
    )
}

#[tokio::test]
async fn test_handler_receives_decoded_body() {
    let container = running_container();
    container.use_stage(json_decoder());

    let (channel, mut handled) = forwarding_route(
        &container,
        "jsontest.*.events",
        RouteOptions::new().queue("jsontest-events"),
    )
    .await;
    assert_eq!(channel.queue(), Some("jsontest-events"));

    let routed = channel
        .publish(
            EXCHANGE,
            "jsontest.123456.events",
            serde_json::to_vec(&json!({"msg": "some message"})).unwrap(),
            json_props(),
        )
        .await
        .unwrap();
    assert_eq!(routed, 1);

    let msg = recv(&mut handled).await;
    assert_eq!(msg.body(), Some(&json!({"msg": "some message"})));
    assert_eq!(msg.routing_key(), "jsontest.123456.events");

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_json_goes_to_error_handler() {
    let container = running_container();
    container.use_stage(json_decoder());

    let (on_error, mut errors) = forwarding_error_handler();
    let (channel, mut handled) = forwarding_route(
        &container,
        "jsontest.*.events",
        RouteOptions::new().error_handler(on_error),
    )
    .await;

    channel
        .publish(EXCHANGE, "jsontest.1.events", r#"{msg: "some message"}"#, json_props())
        .await
        .unwrap();

    let err = recv(&mut errors).await;
    assert_eq!(err.stage(), "json_decode");
    assert_eq!(err.route(), "jsontest.*.events");
    assert!(err.error().is_decode_error());
    assert_eq!(err.delivery_id(), err.message().delivery_id());
    assert!(!err.message().has_body());
    assert_quiet(&mut handled).await;

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_non_json_content_type_reaches_handler_without_body() {
    let container = running_container();
    container.use_stage(json_decoder());

    let (on_error, mut errors) = forwarding_error_handler();
    let (channel, mut handled) =
        forwarding_route(&container, "text.#", RouteOptions::new().error_handler(on_error)).await;

    channel
        .publish(
            EXCHANGE,
            "text.greeting",
            "Hello world!",
            MessageProperties::new().with_content_type("text/plain"),
        )
        .await
        .unwrap();
    channel
        .publish(EXCHANGE, "text.untyped", "Hello world!", MessageProperties::new())
        .await
        .unwrap();

    for _ in 0..2 {
        let msg = recv(&mut handled).await;
        assert!(!msg.has_body());
        assert_eq!(msg.payload().as_ref(), b"Hello world!");
    }
    assert_quiet(&mut errors).await;

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_route_stage_with_ignore_content_type() {
    let container = running_container();

    let decoder = json_decoder_with(DecoderConfig::new().with_ignore_content_type(true));
    let (channel, mut handled) =
        forwarding_route(&container, "raw.*", RouteOptions::new().stage(decoder)).await;

    channel
        .publish(EXCHANGE, "raw.x", r#"{"foo":"bar"}"#, MessageProperties::new())
        .await
        .unwrap();

    assert_eq!(recv(&mut handled).await.body(), Some(&json!({"foo": "bar"})));
    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_global_stage_applies_only_to_later_routes() {
    let container = running_container();

    let (_, mut before) = forwarding_route(&container, "before.*", RouteOptions::new()).await;
    container.use_stage(json_decoder());
    let (channel, mut after) = forwarding_route(&container, "after.*", RouteOptions::new()).await;

    channel
        .publish(EXCHANGE, "before.x", r#"{"n":1}"#, json_props())
        .await
        .unwrap();
    channel
        .publish(EXCHANGE, "after.x", r#"{"n":2}"#, json_props())
        .await
        .unwrap();

    assert!(!recv(&mut before).await.has_body());
    assert_eq!(recv(&mut after).await.body(), Some(&json!({"n": 2})));

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_global_stages_run_before_route_stages() {
    let container = running_container();
    container.use_stage(json_decoder());

    let requires_body = FnStage::new("requires_body", |msg: Message| async move {
        if msg.has_body() {
            Ok(msg)
        } else {
            Err(StageError::rejected("no body"))
        }
    });

    let (on_error, mut errors) = forwarding_error_handler();
    let (channel, mut handled) = forwarding_route(
        &container,
        "orders.*",
        RouteOptions::new().stage(requires_body).error_handler(on_error),
    )
    .await;

    channel
        .publish(EXCHANGE, "orders.created", r#"{"id":7}"#, json_props())
        .await
        .unwrap();
    assert_eq!(recv(&mut handled).await.body(), Some(&json!({"id": 7})));

    channel
        .publish(EXCHANGE, "orders.created", "plain", MessageProperties::new())
        .await
        .unwrap();
    let err = recv(&mut errors).await;
    assert_eq!(err.stage(), "requires_body");
    assert_eq!(err.error().to_string(), "no body");

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejection_without_error_handler_is_dropped() {
    let container = running_container();
    container.use_stage(json_decoder());
    let (channel, mut handled) = forwarding_route(&container, "drop.*", RouteOptions::new()).await;

    channel
        .publish(EXCHANGE, "drop.a", "", json_props())
        .await
        .unwrap();
    channel
        .publish(EXCHANGE, "drop.b", r#"{"ok":true}"#, json_props())
        .await
        .unwrap();

    let msg = recv(&mut handled).await;
    assert_eq!(msg.routing_key(), "drop.b");
    assert_quiet(&mut handled).await;

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_handler_error_does_not_reach_error_handler() {
    let container = running_container();
    container.use_stage(json_decoder());

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let (on_error, mut errors) = forwarding_error_handler();

    let channel = container
        .route(
            "fail.*",
            RouteOptions::new().error_handler(on_error),
            move |_msg| {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Err(ConduitError::internal("handler exploded"))
                }
            },
        )
        .ready()
        .await
        .unwrap();

    channel
        .publish(EXCHANGE, "fail.x", r#"{}"#, json_props())
        .await
        .unwrap();

    assert_quiet(&mut errors).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unmatched_routing_key_is_not_delivered() {
    let container = running_container();
    let (channel, mut handled) =
        forwarding_route(&container, "jsontest.*.events", RouteOptions::new()).await;

    let routed = channel
        .publish(EXCHANGE, "jsontest.events", "{}", json_props())
        .await
        .unwrap();
    assert_eq!(routed, 0);
    assert_quiet(&mut handled).await;

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let container = running_container();
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done) = mpsc::unbounded_channel();

    let (c, p) = (Arc::clone(&current), Arc::clone(&peak));
    let channel = container
        .route("work.*", RouteOptions::new().max_concurrent(2), move |_msg| {
            let (c, p, done_tx) = (Arc::clone(&c), Arc::clone(&p), done_tx.clone());
            async move {
                let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                c.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(());
                Ok(())
            }
        })
        .ready()
        .await
        .unwrap();

    for i in 0..8 {
        channel
            .publish(EXCHANGE, &format!("work.{i}"), "x", MessageProperties::new())
            .await
            .unwrap();
    }
    for _ in 0..8 {
        recv(&mut done).await;
    }

    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency was {peak}");

    container.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_deliveries() {
    let container = running_container();
    let finished = Arc::new(AtomicUsize::new(0));
    let (started_tx, mut started) = mpsc::unbounded_channel();

    let f = Arc::clone(&finished);
    let channel = container
        .route("slow.*", RouteOptions::new(), move |_msg| {
            let (f, started_tx) = (Arc::clone(&f), started_tx.clone());
            async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_millis(50)).await;
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .ready()
        .await
        .unwrap();

    channel
        .publish(EXCHANGE, "slow.job", "x", MessageProperties::new())
        .await
        .unwrap();
    recv(&mut started).await;

    container.shutdown().await.unwrap();
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    let routed = channel
        .publish(EXCHANGE, "slow.job", "x", MessageProperties::new())
        .await
        .unwrap();
    assert_eq!(routed, 0, "queue should be unbound after shutdown");
}

#[tokio::test]
async fn test_shutdown_times_out_on_stuck_handler() {
    let container = Container::with_config(
        MemoryTransport::new(),
        ContainerConfig::default().with_shutdown_timeout(Duration::from_millis(20)),
    );
    container.init().unwrap();
    let (started_tx, mut started) = mpsc::unbounded_channel();

    let channel = container
        .route("stuck.*", RouteOptions::new(), move |_msg| {
            let started_tx = started_tx.clone();
            async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .ready()
        .await
        .unwrap();

    channel
        .publish(EXCHANGE, "stuck.job", "x", MessageProperties::new())
        .await
        .unwrap();
    recv(&mut started).await;

    let err = container.shutdown().await.unwrap_err();
    assert!(matches!(err, ServerError::ShutdownTimeout(t) if t == Duration::from_millis(20)));
}
