use std::fmt;
use std::time::Duration;

/// Transport failed to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded the transport's overall time cap.
    Timeout,

    /// Connection could not be established.
    Connect(String),

    /// Any other failure while sending the request or reading the response.
    Request(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout =>
                write!(f, "request timed out"),
            TransportError::Connect(message) =>
                write!(f, "connection failed: {}", message),
            TransportError::Request(message) =>
                write!(f, "request failed: {}", message),
        }
    }
}

impl std::error::Error for TransportError {}

/// The scheduler refused a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduler has been shut down.
    Closed,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Closed =>
                write!(f, "scheduler is shut down"),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Reasons an incoming webhook request fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    MissingSignature,
    InvalidSignature,
    MalformedBody,
    EventMismatch,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::MissingSignature =>
                write!(f, "signature header missing"),
            VerificationError::InvalidSignature =>
                write!(f, "signature does not match body"),
            VerificationError::MalformedBody =>
                write!(f, "body is not a delivery document"),
            VerificationError::EventMismatch =>
                write!(f, "event header does not match body"),
        }
    }
}

impl std::error::Error for VerificationError {}

/// Result of one HTTP attempt.
///
/// Any received response counts as delivered, whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(u16),
    Failure(TransportError),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }
}

/// Where a delivery attempt ends up after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// Terminal: a response was received.
    Delivered { status_code: u16 },

    /// Non-terminal: a retry is queued behind `delay`.
    RetryScheduled {
        delay: Duration,
        retries_remaining: u32,
    },

    /// Terminal: the attempt failed with no retries left.
    Exhausted,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::RetryScheduled { .. })
    }
}
