use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::DeliveryAttempt;

/// Table-driven retry delays.
///
/// `delay_for(n)` is the wait before retry number `n + 1`. Indexes past the
/// end of the table fall back to `floor`. Pure: no clock, no scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    schedule: Vec<Duration>,
    floor: Duration,
}

impl BackoffPolicy {
    /// 15 minutes, 5 minutes, then 1 minute for every further retry.
    pub const DEFAULT_SCHEDULE_SECS: [u64; 3] = [900, 300, 60];
    pub const DEFAULT_FLOOR_SECS: u64 = 60;

    pub fn new(schedule: Vec<Duration>, floor: Duration) -> Self {
        Self { schedule, floor }
    }

    /// Delay before the next retry, given how many retries were already used.
    pub fn delay_for(&self, attempts_used: u32) -> Duration {
        usize::try_from(attempts_used)
            .ok()
            .and_then(|index| self.schedule.get(index))
            .copied()
            .unwrap_or(self.floor)
    }

    /// Delay after `attempt` has just failed.
    pub fn delay_after_failure(&self, attempt: &DeliveryAttempt) -> Duration {
        self.delay_for(attempt.attempts_used())
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            schedule: Self::DEFAULT_SCHEDULE_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            floor: Duration::from_secs(Self::DEFAULT_FLOOR_SECS),
        }
    }
}
