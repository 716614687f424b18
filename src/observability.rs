//! Logging setup for the dashboard server and the structured events it emits at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{env_value, CurrencyConfig, ServerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Unparseable format or target values keep their defaults rather than failing startup.
pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(level) = env_value("ARENA_LOG_LEVEL") {
        config.level = level;
    }
    if let Some(format) = env_value("ARENA_LOG_FORMAT").and_then(|raw| parse_log_format(&raw)) {
        config.format = format;
    }
    if let Some(include_target) = env_value("ARENA_LOG_TARGET").and_then(|raw| parse_bool(&raw)) {
        config.include_target = include_target;
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

/// Where the dashboard's market data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    Bundle { path: PathBuf },
    LivePortal { refresh_interval_ms: u64 },
    Empty { reason: &'static str },
}

impl SourceSelection {
    pub fn name(&self) -> &'static str {
        match self {
            SourceSelection::Bundle { .. } => "bundle",
            SourceSelection::LivePortal { .. } => "live_portal",
            SourceSelection::Empty { .. } => "empty",
        }
    }
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "dashboard_server",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_config_loaded(server: &ServerConfig, currency: &CurrencyConfig) {
    info!(
        component = "dashboard_server",
        event = "app.config",
        bind_addr = %server.bind_addr,
        snapshot_path = server.snapshot_path.as_ref().map(|p| p.display().to_string()),
        refresh_interval_ms = server.refresh_interval_ms,
        platinum_to_gold = currency.platinum_to_gold
    );
}

pub fn log_source_selected(selection: &SourceSelection) {
    let source = selection.name();
    match selection {
        SourceSelection::Bundle { path } => info!(
            component = "dashboard_server",
            event = "source.selected",
            source,
            path = %path.display()
        ),
        SourceSelection::LivePortal {
            refresh_interval_ms,
        } => info!(
            component = "dashboard_server",
            event = "source.selected",
            source,
            refresh_interval_ms
        ),
        SourceSelection::Empty { reason } => info!(
            component = "dashboard_server",
            event = "source.selected",
            source,
            reason
        ),
    }
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "dashboard_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        route = "/api"
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env::with_env_vars;

    const LOG_VARS: [&str; 3] = ["ARENA_LOG_LEVEL", "ARENA_LOG_FORMAT", "ARENA_LOG_TARGET"];

    #[test]
    fn defaults_when_env_missing() {
        let vars: Vec<_> = LOG_VARS.iter().map(|key| (*key, None)).collect();
        let cfg = with_env_vars(&vars, logging_config_from_env);
        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn reads_level_format_and_target() {
        let cfg = with_env_vars(
            &[
                ("ARENA_LOG_LEVEL", Some("arena_market=debug")),
                ("ARENA_LOG_FORMAT", Some(" JSON ")),
                ("ARENA_LOG_TARGET", Some("off")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg.level, "arena_market=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn unknown_format_or_target_keeps_defaults() {
        let cfg = with_env_vars(
            &[
                ("ARENA_LOG_LEVEL", Some("   ")),
                ("ARENA_LOG_FORMAT", Some("yaml")),
                ("ARENA_LOG_TARGET", Some("maybe")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn source_names_are_stable() {
        assert_eq!(
            SourceSelection::Bundle {
                path: PathBuf::from("a.json")
            }
            .name(),
            "bundle"
        );
        assert_eq!(
            SourceSelection::LivePortal {
                refresh_interval_ms: 1
            }
            .name(),
            "live_portal"
        );
        assert_eq!(SourceSelection::Empty { reason: "x" }.name(), "empty");
    }
}
