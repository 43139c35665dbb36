use serde_json::json;
use tracing_subscriber::EnvFilter;
use webhook_fanout::{Dispatcher, DispatcherConfig, Payload, SubscriptionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dispatcher = Dispatcher::new(DispatcherConfig::default())?;

    dispatcher
        .register(
            "order.created",
            "https://example.com/webhook",
            SubscriptionConfig::new().with_secret("supersecret").with_retries(3),
        )
        .await;

    let mut payload = Payload::new();
    payload.insert("id".to_string(), json!(123));
    payload.insert("total_cents".to_string(), json!(4_200));

    let queued = dispatcher.dispatch("order.created", payload).await;
    tracing::info!(queued, "order.created dispatched");

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    dispatcher.shutdown().await;
    Ok(())
}
