use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of an event, such as `order.created`.
pub type EventName = String;

/// Structured event payload.
///
/// Backed by `serde_json::Map`, which keeps keys sorted, so the same logical
/// payload always serializes to the same bytes.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Registry-assigned identifier for a subscription.
///
/// Strongly typed so it cannot be confused with other integer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// Options accepted by `register`.
///
/// Defaults:
/// - secret: empty
/// - retries: 3
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Key used for HMAC signing. An empty secret is a valid (empty) key.
    pub secret: Vec<u8>,

    /// Number of retries after the initial attempt.
    pub retries: u32,
}

impl SubscriptionConfig {
    pub const DEFAULT_RETRIES: u32 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HMAC secret.
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Set the retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            secret: Vec::new(),
            retries: Self::DEFAULT_RETRIES,
        }
    }
}

impl fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("secret", &Redacted(self.secret.len()))
            .field("retries", &self.retries)
            .finish()
    }
}

/// A registered destination for one event name.
///
/// Created by the registry and never mutated afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,

    /// Event name this subscription listens to.
    pub event: EventName,

    /// Target URL for delivery.
    pub url: String,

    /// HMAC key. May be empty.
    pub secret: Vec<u8>,

    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Inactive subscriptions are skipped at dispatch time.
    pub active: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("url", &self.url)
            .field("secret", &Redacted(self.secret.len()))
            .field("max_retries", &self.max_retries)
            .field("active", &self.active)
            .finish()
    }
}

struct Redacted(usize);

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} bytes redacted>", self.0)
    }
}

/// The document that is signed and sent as the request body.
///
/// Field order is part of the wire contract: `event`, `payload`, `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub event: String,
    pub payload: Payload,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl DeliveryPayload {
    pub fn new(event: impl Into<String>, payload: Payload, timestamp: u64) -> Self {
        Self {
            event: event.into(),
            payload,
            timestamp,
        }
    }
}

/// A unit of work handed to the scheduler.
///
/// Self-contained: carries the subscription by value and its own retry
/// budget, so any worker (or process) can execute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub subscription: Subscription,
    pub event: String,
    pub payload: Payload,
    pub retries_remaining: u32,
}

impl DeliveryAttempt {
    /// First attempt for a subscription, with its full retry budget.
    pub fn initial(subscription: Subscription, payload: Payload) -> Self {
        Self {
            event: subscription.event.clone(),
            retries_remaining: subscription.max_retries,
            subscription,
            payload,
        }
    }

    /// Retries already spent before this attempt.
    pub fn attempts_used(&self) -> u32 {
        self.subscription
            .max_retries
            .saturating_sub(self.retries_remaining)
    }

    /// The follow-up attempt after a failure, or `None` once the budget is spent.
    pub fn next_retry(&self) -> Option<Self> {
        let retries_remaining = self.retries_remaining.checked_sub(1)?;
        Some(Self {
            retries_remaining,
            ..self.clone()
        })
    }

    /// Stamp the payload for sending.
    pub fn delivery_payload(&self, timestamp: u64) -> DeliveryPayload {
        DeliveryPayload::new(self.event.clone(), self.payload.clone(), timestamp)
    }
}

/// Outcome recorded for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Success => write!(f, "success"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One record per executed attempt, handed to the log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLogRecord {
    pub subscription_id: SubscriptionId,
    pub url: String,
    pub event: String,
    /// `0` when no HTTP response was obtained.
    pub status_code: u16,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub attempts_used: u32,
    pub retries_remaining: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl DeliveryLogRecord {
    pub fn success(attempt: &DeliveryAttempt, status_code: u16, timestamp: u64) -> Self {
        Self::from_attempt(attempt, status_code, DeliveryStatus::Success, None, timestamp)
    }

    pub fn failed(attempt: &DeliveryAttempt, error: impl Into<String>, timestamp: u64) -> Self {
        Self::from_attempt(attempt, 0, DeliveryStatus::Failed, Some(error.into()), timestamp)
    }

    fn from_attempt(
        attempt: &DeliveryAttempt,
        status_code: u16,
        status: DeliveryStatus,
        error: Option<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            subscription_id: attempt.subscription.id,
            url: attempt.subscription.url.clone(),
            event: attempt.event.clone(),
            status_code,
            status,
            error,
            attempts_used: attempt.attempts_used(),
            retries_remaining: attempt.retries_remaining,
            timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}
