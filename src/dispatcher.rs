use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::backoff::BackoffPolicy;
use crate::clock::{Clock, SystemClock};
use crate::engine::DispatchEngine;
use crate::registry::SubscriptionRegistry;
use crate::scheduler::TokioScheduler;
use crate::sink::{DeliveryLogSink, TracingLogSink};
use crate::transport::{default_user_agent, Transport, DEFAULT_REQUEST_TIMEOUT};
use crate::types::{Payload, Subscription, SubscriptionConfig};
use crate::worker::worker_loop;

#[cfg(feature = "http")]
use crate::error::TransportError;
#[cfg(feature = "http")]
use crate::transport::HttpTransport;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of workers draining the ready queue.
    pub worker_count: usize,

    /// Capacity of the ready queue. Dispatch waits when it is full.
    pub queue_size: usize,

    /// Overall cap on a single HTTP request.
    pub request_timeout: Duration,

    pub user_agent: String,

    pub backoff: BackoffPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            worker_count,
            queue_size: 1_000,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: default_user_agent(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Capabilities a host application can inject into a `Dispatcher`.
pub struct DispatcherParts {
    pub registry: Arc<SubscriptionRegistry>,
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<dyn DeliveryLogSink>,
    pub clock: Arc<dyn Clock>,
}

impl DispatcherParts {
    /// Fresh registry, tracing sink and system clock around `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: Arc::new(SubscriptionRegistry::new()),
            transport,
            sink: Arc::new(TracingLogSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_registry(mut self, registry: Arc<SubscriptionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DeliveryLogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Ready-to-run webhook fan-out: registry, engine, in-process scheduler and
/// a worker pool.
pub struct Dispatcher {
    engine: Arc<DispatchEngine>,
    scheduler: Arc<TokioScheduler>,
    is_running: Arc<AtomicBool>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Dispatcher delivering over HTTP. Must be called within a tokio runtime.
    #[cfg(feature = "http")]
    pub fn new(config: DispatcherConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::with_timeout(config.request_timeout, config.user_agent.clone())?;
        Ok(Self::with_parts(config, DispatcherParts::new(Arc::new(transport))))
    }

    /// Must be called within a tokio runtime.
    pub fn with_parts(config: DispatcherConfig, parts: DispatcherParts) -> Self {
        let (scheduler, ready_rx) = TokioScheduler::new(config.queue_size);
        let scheduler = Arc::new(scheduler);

        let engine = Arc::new(
            DispatchEngine::new(parts.registry, scheduler.clone(), parts.transport, parts.sink)
                .with_backoff(config.backoff.clone())
                .with_clock(parts.clock),
        );

        let shared_ready_rx = Arc::new(Mutex::new(ready_rx));
        let worker_handles = (0..config.worker_count.max(1))
            .map(|_| tokio::spawn(worker_loop(shared_ready_rx.clone(), engine.clone())))
            .collect();

        tracing::debug!(
            worker_count = config.worker_count.max(1),
            queue_size = config.queue_size,
            "dispatcher started"
        );

        Self {
            engine,
            scheduler,
            is_running: Arc::new(AtomicBool::new(true)),
            worker_handles: Mutex::new(worker_handles),
        }
    }

    /// Register a subscription for `event`.
    pub async fn register(
        &self,
        event: impl Into<String>,
        url: impl Into<String>,
        config: SubscriptionConfig,
    ) -> Arc<Subscription> {
        self.engine.registry().register(event, url, config).await
    }

    /// Fan `payload` out to every active subscription for `event`.
    ///
    /// Fire-and-forget: returns the number of deliveries queued, `0` when
    /// nobody listens or the dispatcher is shut down.
    pub async fn dispatch(&self, event: &str, payload: Payload) -> usize {
        if !self.is_running() {
            tracing::warn!(event, "dispatch after shutdown ignored");
            return 0;
        }
        self.engine.dispatch(event, payload).await
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.engine.registry()
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Stop accepting work, drop pending retries and wait for workers to
    /// finish whatever is already queued.
    ///
    /// Dropping the dispatcher without calling this aborts the workers
    /// instead, losing queued attempts.
    pub async fn shutdown(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.scheduler.shutdown().await;

        let handles: Vec<JoinHandle<()>> = self.worker_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        tracing::debug!("dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for handle in self.worker_handles.get_mut().drain(..) {
            handle.abort();
        }
    }
}
