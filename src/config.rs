//! Business constants and server settings, read from the environment.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PLATINUM_TO_GOLD: i64 = 1_000_000;
pub const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8080";
/// Hourly, matching the upstream data cache.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 3_600_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    NotPositive { var: &'static str, value: String },
    #[error("{var} could not be parsed: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Currency conversion rules. Gems have no gold rate and are never converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyConfig {
    pub platinum_to_gold: i64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            platinum_to_gold: DEFAULT_PLATINUM_TO_GOLD,
        }
    }
}

pub fn currency_config_from_env() -> Result<CurrencyConfig, ConfigError> {
    let mut config = CurrencyConfig::default();
    if let Some(raw) = env_value("ARENA_PLATINUM_TO_GOLD") {
        config.platinum_to_gold = parse_positive("ARENA_PLATINUM_TO_GOLD", &raw)?;
    }
    Ok(config)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub snapshot_path: Option<PathBuf>,
    pub refresh_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_DASHBOARD_ADDR.to_string(),
            snapshot_path: None,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

pub fn server_config_from_env() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(addr) = env_value("ARENA_DASHBOARD_ADDR") {
        config.bind_addr = addr;
    }
    if let Some(path) = env_value("ARENA_SNAPSHOT_PATH") {
        config.snapshot_path = Some(PathBuf::from(path));
    }
    if let Some(raw) = env_value("ARENA_REFRESH_INTERVAL_MS") {
        let parsed = parse_positive("ARENA_REFRESH_INTERVAL_MS", &raw)?;
        config.refresh_interval_ms = parsed as u64;
    }

    Ok(config)
}

/// Trimmed value of `key`; unset and blank are both `None`.
pub(crate) fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_positive(var: &'static str, raw: &str) -> Result<i64, ConfigError> {
    let parsed: i64 = raw.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_string(),
    })?;
    if parsed <= 0 {
        return Err(ConfigError::NotPositive {
            var,
            value: raw.to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    pub(crate) fn with_env_vars<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let _guard = env_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), env::var(key).ok()))
            .collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let output = f();

        for (key, value) in previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        output
    }
}
