/// Errors surfaced synchronously by the watchdog, plus the report handed to
/// the failure hook when an action panics on the timer task.
use crate::watchdog::Epoch;
use std::time::Duration;

/// Errors returned by `Watchdog` constructors, `set_interval` and `arm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogError {
    /// The interval is zero or too large to schedule.
    InvalidInterval {
        interval: Duration,
        reason: &'static str,
    },
    /// `stop()` was called; the watchdog no longer accepts armings.
    Stopped,
    /// No tokio runtime was reachable to schedule the deferred check.
    ///
    /// Only raised when no handle was supplied and `arm()` runs outside a
    /// runtime. A `with_handle` handle to a runtime that has shut down is not
    /// reported here; the arming is accepted and its check never runs.
    SchedulerUnavailable { reason: String },
}

impl std::fmt::Display for WatchdogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogError::InvalidInterval { interval, reason } => {
                write!(f, "invalid watchdog interval {:?}: {}", interval, reason)
            }
            WatchdogError::Stopped => write!(f, "watchdog has been stopped"),
            WatchdogError::SchedulerUnavailable { reason } => {
                write!(f, "cannot schedule deferred check: {}", reason)
            }
        }
    }
}

impl std::error::Error for WatchdogError {}

/// Report for an expiry action that panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    /// Epoch of the arming whose action failed.
    pub epoch: Epoch,
    /// Panic payload rendered as text, or a placeholder for non-string payloads.
    pub message: String,
}

impl ActionFailure {
    pub(crate) fn from_panic(epoch: Epoch, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { epoch, message }
    }
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expiry action for epoch {} panicked: {}", self.epoch, self.message)
    }
}

impl std::error::Error for ActionFailure {}
