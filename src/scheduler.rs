use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::SchedulerError;
use crate::types::DeliveryAttempt;

/// Capability to execute attempts now or after a delay.
///
/// Implementations only promise at-least-once execution of each submitted
/// attempt. Ordering between attempts is not guaranteed.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn run_now(&self, attempt: DeliveryAttempt) -> Result<(), SchedulerError>;

    async fn run_after(&self, delay: Duration, attempt: DeliveryAttempt) -> Result<(), SchedulerError>;
}

/// In-process scheduler: a bounded ready queue plus a timer heap.
///
/// Ready attempts are read from the receiver returned by `new`, normally by
/// the worker pool. Delayed attempts sit in a min-heap owned by a timer task
/// until they are due.
pub struct TokioScheduler {
    channels: Mutex<Option<Channels>>,
}

struct Channels {
    ready_tx: mpsc::Sender<DeliveryAttempt>,
    timer_tx: mpsc::UnboundedSender<TimedAttempt>,
    timer_handle: JoinHandle<()>,
}

impl TokioScheduler {
    /// Must be called from within a tokio runtime.
    pub fn new(queue_size: usize) -> (Self, mpsc::Receiver<DeliveryAttempt>) {
        let (ready_tx, ready_rx) = mpsc::channel(queue_size.max(1));
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let timer_handle = tokio::spawn(timer_loop(timer_rx, ready_tx.clone()));

        let scheduler = Self {
            channels: Mutex::new(Some(Channels {
                ready_tx,
                timer_tx,
                timer_handle,
            })),
        };
        (scheduler, ready_rx)
    }

    /// Stop accepting work and drop every pending timer.
    ///
    /// Once in-flight senders are gone the ready receiver yields `None`,
    /// which is how workers learn to exit.
    pub async fn shutdown(&self) {
        let channels = self.channels.lock().await.take();
        let Some(channels) = channels else { return };

        drop(channels.ready_tx);
        drop(channels.timer_tx);
        channels.timer_handle.abort();
        let _ = channels.timer_handle.await;
    }

    pub async fn is_closed(&self) -> bool {
        self.channels.lock().await.is_none()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Some(channels) = self.channels.get_mut().take() {
            channels.timer_handle.abort();
        }
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn run_now(&self, attempt: DeliveryAttempt) -> Result<(), SchedulerError> {
        let ready_tx = {
            let guard = self.channels.lock().await;
            match guard.as_ref() {
                Some(channels) => channels.ready_tx.clone(),
                None => return Err(SchedulerError::Closed),
            }
        };

        ready_tx.send(attempt).await.map_err(|_| SchedulerError::Closed)
    }

    async fn run_after(&self, delay: Duration, attempt: DeliveryAttempt) -> Result<(), SchedulerError> {
        let guard = self.channels.lock().await;
        let Some(channels) = guard.as_ref() else {
            return Err(SchedulerError::Closed);
        };

        channels
            .timer_tx
            .send(TimedAttempt {
                ready_at: Instant::now() + delay,
                attempt,
            })
            .map_err(|_| SchedulerError::Closed)
    }
}

async fn timer_loop(
    mut timer_rx: mpsc::UnboundedReceiver<TimedAttempt>,
    ready_tx: mpsc::Sender<DeliveryAttempt>,
) {
    let mut delay_heap: BinaryHeap<TimedAttempt> = BinaryHeap::new();

    loop {
        // Move due attempts into the ready queue.
        let now = Instant::now();
        while delay_heap.peek().is_some_and(|timed| timed.ready_at <= now) {
            let Some(timed) = delay_heap.pop() else { break };
            if ready_tx.send(timed.attempt).await.is_err() {
                return;
            }
        }

        match delay_heap.peek().map(|timed| timed.ready_at) {
            Some(next_ready) => {
                tokio::select! {
                    received = timer_rx.recv() => match received {
                        Some(timed) => delay_heap.push(timed),
                        None => return,
                    },
                    _ = sleep_until(next_ready) => {}
                }
            }
            None => match timer_rx.recv().await {
                Some(timed) => delay_heap.push(timed),
                None => return,
            },
        }
    }
}

#[derive(Debug)]
struct TimedAttempt {
    ready_at: Instant,
    attempt: DeliveryAttempt,
}

impl Eq for TimedAttempt {}

impl PartialEq for TimedAttempt {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at.eq(&other.ready_at)
    }
}

impl Ord for TimedAttempt {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest first.
        other.ready_at.cmp(&self.ready_at)
    }
}

impl PartialOrd for TimedAttempt {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
