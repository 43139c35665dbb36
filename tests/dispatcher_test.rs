mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{payload, ScriptedTransport};
use serde_json::json;
use tokio::time::Instant;
use webhook_fanout::{
    DeliveryStatus, Dispatcher, DispatcherConfig, DispatcherParts, InMemoryLogSink,
    SubscriptionConfig,
};

fn config() -> DispatcherConfig {
    DispatcherConfig {
        worker_count: 2,
        queue_size: 16,
        ..Default::default()
    }
}

async fn wait_for_records(sink: &InMemoryLogSink, expected: usize) {
    for _ in 0..200 {
        if sink.len().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
    panic!("expected {expected} log records, got {}", sink.len().await);
}

#[tokio::test(start_paused = true)]
async fn retries_are_delivered_after_backoff() {
    let transport = Arc::new(ScriptedTransport::failing());
    let sink = Arc::new(InMemoryLogSink::new());
    let dispatcher = Dispatcher::with_parts(
        config(),
        DispatcherParts::new(transport.clone()).with_sink(sink.clone()),
    );

    dispatcher
        .register("order.created", "https://x/hook", SubscriptionConfig::new().with_retries(2))
        .await;

    let started = Instant::now();
    assert_eq!(dispatcher.dispatch("order.created", payload(json!({"id": 1}))).await, 1);

    wait_for_records(&sink, 3).await;
    assert!(started.elapsed() >= Duration::from_secs(900 + 300));

    // Give the exhausted chain a chance to misbehave.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    let records = sink.snapshot().await;
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == DeliveryStatus::Failed));
    assert_eq!(transport.calls_to("https://x/hook"), 3);

    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn siblings_are_delivered_independently() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    transport.push("https://slow/hook", Err(webhook_fanout::TransportError::Timeout));
    let sink = Arc::new(InMemoryLogSink::new());
    let dispatcher = Dispatcher::with_parts(
        config(),
        DispatcherParts::new(transport.clone()).with_sink(sink.clone()),
    );

    dispatcher
        .register("order.created", "https://slow/hook", SubscriptionConfig::default())
        .await;
    dispatcher
        .register("order.created", "https://fast/hook", SubscriptionConfig::default())
        .await;

    assert_eq!(dispatcher.dispatch("order.created", payload(json!({"id": 2}))).await, 2);

    wait_for_records(&sink, 3).await;
    let records = sink.snapshot().await;
    let fast: Vec<_> = records.iter().filter(|r| r.url == "https://fast/hook").collect();
    let slow: Vec<_> = records.iter().filter(|r| r.url == "https://slow/hook").collect();
    assert_eq!(fast.len(), 1);
    assert!(fast[0].is_success());
    assert_eq!(
        slow.iter().map(|r| r.status).collect::<Vec<_>>(),
        vec![DeliveryStatus::Failed, DeliveryStatus::Success]
    );

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn dispatch_to_unknown_event_is_a_no_op() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let dispatcher = Dispatcher::with_parts(config(), DispatcherParts::new(transport.clone()));

    assert_eq!(dispatcher.dispatch("nobody.listens", payload(json!({}))).await, 0);
    assert!(transport.requests().is_empty());

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_accepting_work() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let dispatcher = Dispatcher::with_parts(config(), DispatcherParts::new(transport.clone()));
    dispatcher
        .register("order.created", "https://x/hook", SubscriptionConfig::default())
        .await;

    dispatcher.shutdown().await;

    assert!(!dispatcher.is_running());
    assert_eq!(dispatcher.dispatch("order.created", payload(json!({}))).await, 0);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn dropping_the_dispatcher_stops_its_workers() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let dispatcher = Dispatcher::with_parts(config(), DispatcherParts::new(transport.clone()));
    assert!(Arc::strong_count(&transport) > 1);

    drop(dispatcher);

    for _ in 0..100 {
        if Arc::strong_count(&transport) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(Arc::strong_count(&transport), 1);
}

#[test]
fn config_loads_from_partial_json() {
    let config: DispatcherConfig =
        serde_json::from_str(r#"{"worker_count": 8, "queue_size": 64}"#).expect("config");

    assert_eq!(config.worker_count, 8);
    assert_eq!(config.queue_size, 64);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.backoff.delay_for(0), Duration::from_secs(900));
}
