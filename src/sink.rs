use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::types::{DeliveryLogRecord, DeliveryStatus};

/// Receives one record per executed attempt.
///
/// Fire-and-forget: implementations swallow their own failures so logging
/// can never fail a delivery.
#[async_trait]
pub trait DeliveryLogSink: Send + Sync {
    async fn append(&self, record: DeliveryLogRecord);
}

/// Emits each record as a `tracing` event under the `webhook_fanout::delivery` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

#[async_trait]
impl DeliveryLogSink for TracingLogSink {
    async fn append(&self, record: DeliveryLogRecord) {
        match record.status {
            DeliveryStatus::Success => tracing::info!(
                target: "webhook_fanout::delivery",
                subscription_id = %record.subscription_id,
                url = %record.url,
                event = %record.event,
                status_code = record.status_code,
                status = %record.status,
                attempts_used = record.attempts_used,
                timestamp = record.timestamp,
                "delivery attempt"
            ),
            DeliveryStatus::Failed => tracing::warn!(
                target: "webhook_fanout::delivery",
                subscription_id = %record.subscription_id,
                url = %record.url,
                event = %record.event,
                status_code = record.status_code,
                status = %record.status,
                error = record.error.as_deref().unwrap_or_default(),
                attempts_used = record.attempts_used,
                retries_remaining = record.retries_remaining,
                timestamp = record.timestamp,
                "delivery attempt"
            ),
        }
    }
}

/// Keeps every record in memory, in append order.
#[derive(Debug, Default)]
pub struct InMemoryLogSink {
    records: Mutex<Vec<DeliveryLogRecord>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<DeliveryLogRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl DeliveryLogSink for InMemoryLogSink {
    async fn append(&self, record: DeliveryLogRecord) {
        self.records.lock().await.push(record);
    }
}

/// Forwards every record to each inner sink in order.
#[derive(Default)]
pub struct FanoutLogSink {
    sinks: Vec<Arc<dyn DeliveryLogSink>>,
}

impl FanoutLogSink {
    pub fn new(sinks: Vec<Arc<dyn DeliveryLogSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn DeliveryLogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl DeliveryLogSink for FanoutLogSink {
    async fn append(&self, record: DeliveryLogRecord) {
        for sink in &self.sinks {
            sink.append(record.clone()).await;
        }
    }
}
