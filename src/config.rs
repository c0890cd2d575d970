use crate::error::WatchdogError;
use crate::watchdog::validate_interval;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from watchdog.toml.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub watchdog: WatchdogConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WatchdogConfig {
    pub interval_ms: u64,
}

/// Settings for the console driver's pet loop.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DemoConfig {
    pub pets: u32,
    pub pet_every_ms: u64,
    pub linger_ms: u64,
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl DemoConfig {
    pub fn pet_every(&self) -> Duration {
        Duration::from_millis(self.pet_every_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

// --- Default implementations ---

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            pets: 10,
            pet_every_ms: 500,
            linger_ms: 1500,
        }
    }
}

/// Errors produced while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML for `AppConfig`.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The file parsed but holds a value the watchdog rejects.
    Invalid {
        path: PathBuf,
        source: WatchdogError,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid { path, source } => {
                write!(f, "invalid config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { source, .. } => Some(source),
        }
    }
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(AppConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let config = parse_config(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate().map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(config)
}

fn parse_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}

impl AppConfig {
    /// Reject values the watchdog would refuse at construction time.
    pub fn validate(&self) -> Result<(), WatchdogError> {
        validate_interval(self.watchdog.interval()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.watchdog.interval(), Duration::from_secs(1));
        assert_eq!(config.demo.pets, 10);
        assert_eq!(config.demo.pet_every(), Duration::from_millis(500));
        assert_eq!(config.demo.linger(), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_parse_partial_section() {
        let config = parse_config("[watchdog]\ninterval_ms = 300\n").unwrap();
        assert_eq!(config.watchdog.interval_ms, 300);
        assert_eq!(config.demo, DemoConfig::default());
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
[watchdog]
interval_ms = 250

[demo]
pets = 3
pet_every_ms = 100
linger_ms = 400
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.watchdog.interval_ms, 250);
        assert_eq!(config.demo.pets, 3);
        assert_eq!(config.demo.pet_every_ms, 100);
        assert_eq!(config.demo.linger_ms, 400);
    }

    #[test]
    fn test_parse_wrong_type_fails() {
        assert!(parse_config("[watchdog]\ninterval_ms = \"fast\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("watchdog.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watchdog.toml");
        std::fs::write(&path, "[watchdog]\ninterval_ms = 42\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.watchdog.interval(), Duration::from_millis(42));
    }

    #[test]
    fn test_load_bad_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watchdog.toml");
        std::fs::write(&path, "[watchdog\ninterval_ms = 42\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_load_zero_interval_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watchdog.toml");
        std::fs::write(&path, "[watchdog]\ninterval_ms = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_interval_too_large_for_timer_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watchdog.toml");
        std::fs::write(&path, "[watchdog]\ninterval_ms = 9223372036854775807\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                source: WatchdogError::InvalidInterval { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("64-bit nanoseconds"));
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
