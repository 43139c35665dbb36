//! Signed webhook fan-out with bounded retry-with-backoff.
//!
//! An event is fanned out to every active subscription registered for its
//! name. Each subscription gets its own self-contained `DeliveryAttempt`,
//! signed with HMAC-SHA256 and POSTed to the subscriber. Failed attempts are
//! retried on a fixed table (15m, 5m, then 1m) until the subscription's
//! retry budget is spent.
//!
//! ## Guarantees
//! - One log record per executed attempt
//! - Per-subscription isolation: one exhausted subscription never affects
//!   its siblings
//! - Failures never reach the caller of `dispatch`
//!
//! ## Non-Guarantees
//! - Subscriptions survive restarts
//! - Ordering between subscriptions or between dispatches
//! - Retrying on HTTP error statuses: any received response is delivered
//!
//! ## Wire contract
//! - Body: compact JSON `{"event","payload","timestamp"}` in that order,
//!   object keys sorted
//! - `X-Webhook-Signature`: hex HMAC-SHA256 of the body
//! - `X-Webhook-Event`: event name
//!
//! The scheduler, transport and log sink are injected capabilities. The
//! `Dispatcher` wires in-process defaults for all three.

mod backoff;
mod clock;
mod dispatcher;
mod engine;
mod error;
mod registry;
mod scheduler;
mod signing;
mod sink;
mod transport;
mod types;
mod worker;

pub use backoff::BackoffPolicy;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherParts};
pub use engine::DispatchEngine;
pub use error::{
    AttemptOutcome,
    AttemptState,
    SchedulerError,
    TransportError,
    VerificationError,
};
pub use registry::SubscriptionRegistry;
pub use scheduler::{Scheduler, TokioScheduler};
pub use signing::{
    canonical_bytes,
    sign,
    sign_bytes,
    verify,
    verify_body,
    is_timestamp_fresh,
    parse_signature_headers,
    verify_webhook_request,
    ParsedSignature,
    EVENT_HEADER,
    SIGNATURE_HEADER,
};
pub use sink::{DeliveryLogSink, FanoutLogSink, InMemoryLogSink, TracingLogSink};
pub use transport::{Transport, DEFAULT_REQUEST_TIMEOUT};
pub use types::{
    DeliveryAttempt,
    DeliveryLogRecord,
    DeliveryPayload,
    DeliveryStatus,
    EventName,
    Payload,
    Subscription,
    SubscriptionConfig,
    SubscriptionId,
};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
