//! Fan-out and the per-attempt retry state machine.
//!
//! ```text
//! Pending -> Executing -> Delivered
//!                      -> RetryScheduled -> (after delay) Executing
//!                      -> Exhausted
//! ```
//!
//! Failures never reach the caller of `dispatch`. They are logged through the
//! sink and either rescheduled or absorbed once the retry budget is spent.

use std::sync::Arc;

use crate::backoff::BackoffPolicy;
use crate::clock::{Clock, SystemClock};
use crate::error::{AttemptOutcome, AttemptState, TransportError};
use crate::registry::SubscriptionRegistry;
use crate::scheduler::Scheduler;
use crate::signing::{canonical_bytes, sign_bytes, EVENT_HEADER, SIGNATURE_HEADER};
use crate::sink::DeliveryLogSink;
use crate::transport::Transport;
use crate::types::{DeliveryAttempt, DeliveryLogRecord, Payload, Subscription};

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

pub struct DispatchEngine {
    registry: Arc<SubscriptionRegistry>,
    scheduler: Arc<dyn Scheduler>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn DeliveryLogSink>,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        scheduler: Arc<dyn Scheduler>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DeliveryLogSink>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            transport,
            sink,
            backoff: BackoffPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Submit one immediate attempt per active subscription for `event`.
    ///
    /// Returns how many attempts the scheduler accepted. An event with no
    /// subscriptions is a no-op.
    pub async fn dispatch(&self, event: &str, payload: Payload) -> usize {
        let subscriptions = self.registry.resolve(event).await;
        if subscriptions.is_empty() {
            tracing::debug!(event, "no subscriptions for event");
            return 0;
        }

        let mut submitted = 0usize;
        for subscription in subscriptions.iter().filter(|s| s.active) {
            let attempt = DeliveryAttempt::initial(Subscription::clone(subscription), payload.clone());

            match self.scheduler.run_now(attempt).await {
                Ok(()) => {
                    submitted += 1;
                    metric_inc("webhook.dispatch.submitted");
                    tracing::debug!(
                        event,
                        subscription_id = %subscription.id,
                        url = %subscription.url,
                        "delivery submitted"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        event,
                        subscription_id = %subscription.id,
                        error = %err,
                        "delivery could not be submitted"
                    );
                }
            }
        }

        submitted
    }

    /// One signed POST. Writes exactly one log record before returning.
    pub async fn execute(&self, attempt: &DeliveryAttempt) -> AttemptOutcome {
        let document = attempt.delivery_payload(self.clock.now_secs());
        let body = canonical_bytes(&document);
        let signature = sign_bytes(&body, &attempt.subscription.secret);
        let headers = [
            (SIGNATURE_HEADER.to_string(), signature),
            (EVENT_HEADER.to_string(), attempt.event.clone()),
        ];

        let result = self
            .transport
            .post(&attempt.subscription.url, body, &headers)
            .await;

        let logged_at = self.clock.now_secs();
        match result {
            Ok(status_code) => {
                metric_inc("webhook.delivery.success");
                self.sink
                    .append(DeliveryLogRecord::success(attempt, status_code, logged_at))
                    .await;
                AttemptOutcome::Success(status_code)
            }
            Err(err) => {
                metric_inc("webhook.delivery.failure");
                self.sink
                    .append(DeliveryLogRecord::failed(attempt, err.to_string(), logged_at))
                    .await;
                AttemptOutcome::Failure(err)
            }
        }
    }

    /// Execute `attempt` and move it to its next state.
    pub async fn run_attempt(&self, attempt: DeliveryAttempt) -> AttemptState {
        match self.execute(&attempt).await {
            AttemptOutcome::Success(status_code) => AttemptState::Delivered { status_code },
            AttemptOutcome::Failure(err) => self.handle_failure(attempt, err).await,
        }
    }

    async fn handle_failure(&self, attempt: DeliveryAttempt, err: TransportError) -> AttemptState {
        let delay = self.backoff.delay_after_failure(&attempt);

        let Some(retry) = attempt.next_retry() else {
            metric_inc("webhook.delivery.exhausted");
            tracing::warn!(
                event = %attempt.event,
                subscription_id = %attempt.subscription.id,
                url = %attempt.subscription.url,
                error = %err,
                "delivery retries exhausted"
            );
            return AttemptState::Exhausted;
        };

        let retries_remaining = retry.retries_remaining;
        match self.scheduler.run_after(delay, retry).await {
            Ok(()) => {
                metric_inc("webhook.delivery.retry_scheduled");
                tracing::info!(
                    event = %attempt.event,
                    subscription_id = %attempt.subscription.id,
                    delay_secs = delay.as_secs(),
                    retries_remaining,
                    "delivery retry scheduled"
                );
                AttemptState::RetryScheduled {
                    delay,
                    retries_remaining,
                }
            }
            Err(scheduler_err) => {
                metric_inc("webhook.delivery.exhausted");
                tracing::warn!(
                    event = %attempt.event,
                    subscription_id = %attempt.subscription.id,
                    error = %scheduler_err,
                    "retry could not be scheduled"
                );
                AttemptState::Exhausted
            }
        }
    }
}
