/// Counters describing what the watchdog's deferred checks decided.
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the watchdog counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogStats {
    /// Successful `arm()` calls.
    pub armed: u64,
    /// Actions invoked (including ones that panicked).
    pub fired: u64,
    /// Checks that found a newer epoch and stood down.
    pub superseded: u64,
    /// Checks that found the watchdog stopped or dropped.
    pub cancelled: u64,
    /// Actions that panicked.
    pub failed: u64,
}

impl WatchdogStats {
    /// Armings whose check has not reported back yet.
    pub fn pending(&self) -> u64 {
        self.armed
            .saturating_sub(self.fired + self.superseded + self.cancelled)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    armed: AtomicU64,
    fired: AtomicU64,
    superseded: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub(crate) fn record_armed(&self) {
        self.armed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fired(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WatchdogStats {
        WatchdogStats {
            armed: self.armed.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
