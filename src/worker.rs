use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::engine::DispatchEngine;
use crate::types::DeliveryAttempt;

/// Main worker loop.
///
/// Each worker pulls ready attempts from the shared queue and runs them
/// through the engine. Retries go back through the scheduler, so a worker
/// never sleeps on a backoff. Exits when the queue is closed and drained.
pub async fn worker_loop(
    rx: Arc<Mutex<mpsc::Receiver<DeliveryAttempt>>>,
    engine: Arc<DispatchEngine>,
) {
    loop {
        let attempt = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let Some(attempt) = attempt else { break };

        let subscription_id = attempt.subscription.id;
        let state = engine.run_attempt(attempt).await;
        tracing::trace!(%subscription_id, ?state, "attempt finished");
    }
}
