//! Synchronous fakes for the engine's capabilities.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use webhook_fanout::{
    AttemptState, DeliveryAttempt, DispatchEngine, FixedClock, InMemoryLogSink, Payload, Scheduler,
    SchedulerError, SubscriptionRegistry, Transport, TransportError,
};

pub const NOW: u64 = 1_700_000_000;

/// What the engine handed to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Now(DeliveryAttempt),
    After(Duration, DeliveryAttempt),
}

impl Submission {
    pub fn attempt(&self) -> &DeliveryAttempt {
        match self {
            Submission::Now(attempt) | Submission::After(_, attempt) => attempt,
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            Submission::Now(_) => None,
            Submission::After(delay, _) => Some(*delay),
        }
    }
}

/// Records every submission and keeps a queue the test drains by hand.
#[derive(Default)]
pub struct RecordingScheduler {
    submissions: Mutex<Vec<Submission>>,
    queue: Mutex<VecDeque<DeliveryAttempt>>,
}

impl RecordingScheduler {
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.submissions().iter().filter_map(Submission::delay).collect()
    }

    pub fn immediate_count(&self) -> usize {
        self.submissions()
            .iter()
            .filter(|s| matches!(s, Submission::Now(_)))
            .count()
    }

    pub fn pop(&self) -> Option<DeliveryAttempt> {
        self.queue.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn run_now(&self, attempt: DeliveryAttempt) -> Result<(), SchedulerError> {
        self.submissions.lock().unwrap().push(Submission::Now(attempt.clone()));
        self.queue.lock().unwrap().push_back(attempt);
        Ok(())
    }

    async fn run_after(&self, delay: Duration, attempt: DeliveryAttempt) -> Result<(), SchedulerError> {
        self.submissions
            .lock()
            .unwrap()
            .push(Submission::After(delay, attempt.clone()));
        self.queue.lock().unwrap().push_back(attempt);
        Ok(())
    }
}

/// Scheduler that refuses everything, as after shutdown.
pub struct ClosedScheduler;

#[async_trait]
impl Scheduler for ClosedScheduler {
    async fn run_now(&self, _attempt: DeliveryAttempt) -> Result<(), SchedulerError> {
        Err(SchedulerError::Closed)
    }

    async fn run_after(&self, _delay: Duration, _attempt: DeliveryAttempt) -> Result<(), SchedulerError> {
        Err(SchedulerError::Closed)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport answering from per-URL scripts, then from a fallback.
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<u16, TransportError>>>>,
    fallback: Result<u16, TransportError>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn always(result: Result<u16, TransportError>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: result,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::always(Ok(200))
    }

    pub fn failing() -> Self {
        Self::always(Err(TransportError::Connect("connection refused".to_string())))
    }

    /// Queue a one-shot answer for `url`.
    pub fn push(&self, url: &str, result: Result<u16, TransportError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(String, String)],
    ) -> Result<u16, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            body,
            headers: headers.to_vec(),
        });

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

pub struct Harness {
    pub registry: Arc<SubscriptionRegistry>,
    pub scheduler: Arc<RecordingScheduler>,
    pub transport: Arc<ScriptedTransport>,
    pub sink: Arc<InMemoryLogSink>,
    pub clock: Arc<FixedClock>,
    pub engine: DispatchEngine,
}

impl Harness {
    pub fn new(transport: ScriptedTransport) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let transport = Arc::new(transport);
        let sink = Arc::new(InMemoryLogSink::new());
        let clock = Arc::new(FixedClock::new(NOW));

        let engine = DispatchEngine::new(
            registry.clone(),
            scheduler.clone(),
            transport.clone(),
            sink.clone(),
        )
        .with_clock(clock.clone());

        Self {
            registry,
            scheduler,
            transport,
            sink,
            clock,
            engine,
        }
    }

    /// Run queued attempts until the scheduler queue is empty.
    pub async fn run_until_idle(&self) -> Vec<AttemptState> {
        let mut states = Vec::new();
        while let Some(attempt) = self.scheduler.pop() {
            states.push(self.engine.run_attempt(attempt).await);
        }
        states
    }
}

pub fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("payload must be an object, got {other}"),
    }
}
