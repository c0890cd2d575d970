/// Restartable deadline timer.
///
/// Every `arm()` bumps a shared epoch counter and spawns a deferred check on
/// the tokio timer. When the interval elapses the check compares the epoch it
/// captured with the current one and runs the action only if no newer arming
/// happened in between. Superseded checks are never cancelled explicitly; they
/// wake up, see a newer epoch, and stand down.
use crate::config::WatchdogConfig;
use crate::error::{ActionFailure, WatchdogError};
use crate::stats::{Counters, WatchdogStats};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Interval used by `Watchdog::default()`.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Callback receiving reports of expiry actions that panicked.
pub type FailureHook = Arc<dyn Fn(&ActionFailure) + Send + Sync>;

/// Identifies one arming. Strictly increasing per watchdog, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Debouncing watchdog timer.
///
/// Cloning is cheap and clones share the same epoch, interval and stop flag.
/// Dropping the last clone stops the watchdog: pending checks hold only a weak
/// reference and will not fire.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<Inner>,
}

struct Inner {
    epoch: AtomicU64,
    interval_nanos: AtomicU64,
    stop: CancellationToken,
    handle: Option<Handle>,
    failure_hook: RwLock<Option<FailureHook>>,
    counters: Counters,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Convert an interval into the nanosecond count stored in the atomic.
pub(crate) fn validate_interval(interval: Duration) -> Result<u64, WatchdogError> {
    if interval.is_zero() {
        return Err(WatchdogError::InvalidInterval {
            interval,
            reason: "interval must be greater than zero",
        });
    }
    u64::try_from(interval.as_nanos()).map_err(|_| WatchdogError::InvalidInterval {
        interval,
        reason: "interval does not fit in 64-bit nanoseconds",
    })
}

impl Watchdog {
    /// Create a watchdog that schedules on whatever tokio runtime `arm()` is
    /// called from.
    pub fn new(interval: Duration) -> Result<Self, WatchdogError> {
        Self::build(interval, None)
    }

    /// Create a watchdog bound to a specific runtime, so `arm()` can be called
    /// from threads that are not inside it.
    pub fn with_handle(interval: Duration, handle: Handle) -> Result<Self, WatchdogError> {
        Self::build(interval, Some(handle))
    }

    pub fn from_config(config: &WatchdogConfig) -> Result<Self, WatchdogError> {
        Self::new(config.interval())
    }

    fn build(interval: Duration, handle: Option<Handle>) -> Result<Self, WatchdogError> {
        let nanos = validate_interval(interval)?;
        Ok(Self::from_nanos(nanos, handle))
    }

    fn from_nanos(interval_nanos: u64, handle: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(Inner {
                epoch: AtomicU64::new(0),
                interval_nanos: AtomicU64::new(interval_nanos),
                stop: CancellationToken::new(),
                handle,
                failure_hook: RwLock::new(None),
                counters: Counters::default(),
            }),
        }
    }

    /// Interval the next `arm()` will use.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.inner.interval_nanos.load(Ordering::Acquire))
    }

    /// Change the interval. Checks already scheduled keep the interval they
    /// captured.
    pub fn set_interval(&self, interval: Duration) -> Result<(), WatchdogError> {
        let nanos = validate_interval(interval)?;
        self.inner.interval_nanos.store(nanos, Ordering::Release);
        tracing::debug!(interval_ms = interval.as_millis() as u64, "watchdog interval changed");
        Ok(())
    }

    /// Epoch of the most recent arming (0 if never armed).
    pub fn epoch(&self) -> Epoch {
        Epoch(self.inner.epoch.load(Ordering::Acquire))
    }

    /// Whether the arming identified by `epoch` can still fire.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        !self.is_stopped() && self.epoch() == epoch
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    pub fn stats(&self) -> WatchdogStats {
        self.inner.counters.snapshot()
    }

    /// Register the callback that receives panics raised by expiry actions.
    /// Replaces any previous hook.
    pub fn set_failure_hook<F>(&self, hook: F)
    where
        F: Fn(&ActionFailure) + Send + Sync + 'static,
    {
        let mut slot = self
            .inner
            .failure_hook
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let hook: FailureHook = Arc::new(hook);
        *slot = Some(hook);
    }

    pub fn clear_failure_hook(&self) {
        let mut slot = self
            .inner
            .failure_hook
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// Reset the deadline and register `on_expire`.
    ///
    /// Returns the epoch assigned to this arming. The action runs once, on a
    /// runtime worker, if `interval` passes without another `arm()` and without
    /// `stop()`. Never blocks.
    ///
    /// A handle passed to `with_handle` whose runtime has already shut down
    /// is not detected: the epoch still advances, the arming is counted, and
    /// the check is dropped by the runtime without running, so it never fires
    /// and stays in `pending()`.
    pub fn arm<F>(&self, on_expire: F) -> Result<Epoch, WatchdogError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_stopped() {
            return Err(WatchdogError::Stopped);
        }

        let handle = match &self.inner.handle {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|e| WatchdogError::SchedulerUnavailable {
                reason: e.to_string(),
            })?,
        };

        let interval = self.interval();
        let epoch = Epoch(self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1);
        self.inner.counters.record_armed();

        tracing::debug!(
            epoch = epoch.get(),
            interval_ms = interval.as_millis() as u64,
            "watchdog armed"
        );

        handle.spawn(deferred_check(
            Arc::downgrade(&self.inner),
            self.inner.stop.clone(),
            epoch,
            interval,
            on_expire,
        ));

        Ok(epoch)
    }

    /// Permanently disarm. Pending checks wake immediately and exit without
    /// firing; later `arm()` calls return `WatchdogError::Stopped`.
    ///
    /// An action that already started is not interrupted.
    pub fn stop(&self) {
        if self.inner.stop.is_cancelled() {
            return;
        }
        self.inner.stop.cancel();
        let pending = self.stats().pending();
        if pending > 0 {
            tracing::warn!(
                epoch = self.epoch().get(),
                pending,
                "watchdog stopped with pending checks"
            );
        } else {
            tracing::info!(epoch = self.epoch().get(), "watchdog stopped");
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::from_nanos(DEFAULT_INTERVAL.as_nanos() as u64, None)
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("epoch", &self.epoch())
            .field("interval", &self.interval())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Inner {
    fn report_failure(&self, failure: ActionFailure) {
        self.counters.record_failed();
        tracing::error!(
            epoch = failure.epoch.get(),
            message = %failure.message,
            "watchdog expiry action panicked"
        );

        let hook = self
            .failure_hook
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(hook) = hook {
            if catch_unwind(AssertUnwindSafe(|| hook(&failure))).is_err() {
                tracing::error!(epoch = failure.epoch.get(), "watchdog failure hook panicked");
            }
        }
    }
}

/// Body of the task spawned by `arm()`.
async fn deferred_check<F>(
    inner: Weak<Inner>,
    stop: CancellationToken,
    epoch: Epoch,
    interval: Duration,
    on_expire: F,
) where
    F: FnOnce() + Send + 'static,
{
    tokio::select! {
        biased;
        _ = stop.cancelled() => {}
        _ = tokio::time::sleep(interval) => {}
    }

    let Some(inner) = inner.upgrade() else {
        tracing::debug!(epoch = epoch.get(), "watchdog dropped before deadline");
        return;
    };

    if inner.stop.is_cancelled() {
        inner.counters.record_cancelled();
        tracing::debug!(epoch = epoch.get(), "watchdog stopped before deadline");
        return;
    }

    let current = inner.epoch.load(Ordering::Acquire);
    if current != epoch.get() {
        inner.counters.record_superseded();
        tracing::debug!(epoch = epoch.get(), current, "arming superseded");
        return;
    }

    inner.counters.record_fired();
    tracing::info!(
        epoch = epoch.get(),
        interval_ms = interval.as_millis() as u64,
        "watchdog expired"
    );

    if let Err(payload) = catch_unwind(AssertUnwindSafe(on_expire)) {
        inner.report_failure(ActionFailure::from_panic(epoch, payload));
    }
}
