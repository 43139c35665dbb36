use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::{Subscription, SubscriptionConfig, SubscriptionId};

/// In-memory mapping from event name to its subscriptions.
///
/// Registration is expected at setup time; dispatch only reads. The lock is
/// read-mostly so concurrent registration is still safe.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<String, Vec<Arc<Subscription>>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an active subscription for `event`.
    ///
    /// No de-duplication: registering the same URL twice yields two
    /// independent subscriptions.
    pub async fn register(
        &self,
        event: impl Into<String>,
        url: impl Into<String>,
        config: SubscriptionConfig,
    ) -> Arc<Subscription> {
        let event = event.into();
        let subscription = Arc::new(Subscription {
            id: SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
            event: event.clone(),
            url: url.into(),
            secret: config.secret,
            max_retries: config.retries,
            active: true,
        });

        tracing::debug!(
            event = %subscription.event,
            url = %subscription.url,
            subscription_id = %subscription.id,
            max_retries = subscription.max_retries,
            "subscription registered"
        );

        let mut guard = self.subscriptions.write().await;
        guard.entry(event).or_default().push(subscription.clone());
        subscription
    }

    /// Same as [`register`](Self::register).
    pub async fn register_subscription(
        &self,
        event: impl Into<String>,
        url: impl Into<String>,
        config: SubscriptionConfig,
    ) -> Arc<Subscription> {
        self.register(event, url, config).await
    }

    #[cfg(test)]
    pub(crate) async fn insert(&self, subscription: Subscription) {
        let mut guard = self.subscriptions.write().await;
        guard
            .entry(subscription.event.clone())
            .or_default()
            .push(Arc::new(subscription));
    }

    /// Subscriptions for `event` in registration order; empty when none.
    pub async fn resolve(&self, event: &str) -> Vec<Arc<Subscription>> {
        let guard = self.subscriptions.read().await;
        guard.get(event).cloned().unwrap_or_default()
    }

    /// Total number of subscriptions across all events.
    pub async fn len(&self) -> usize {
        let guard = self.subscriptions.read().await;
        guard.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Event names that have at least one subscription, sorted.
    pub async fn events(&self) -> Vec<String> {
        let guard = self.subscriptions.read().await;
        let mut events: Vec<String> = guard.keys().cloned().collect();
        events.sort();
        events
    }
}
