//! Restartable watchdog timer: pet it with `arm()` and the supplied action
//! runs once if no newer `arm()` arrives within the interval.

pub mod config;
pub mod error;
pub mod stats;
pub mod watchdog;

pub use config::{load_config, AppConfig, ConfigError, DemoConfig, WatchdogConfig};
pub use error::{ActionFailure, WatchdogError};
pub use stats::WatchdogStats;
pub use watchdog::{Epoch, FailureHook, Watchdog, DEFAULT_INTERVAL};
