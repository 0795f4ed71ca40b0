//! Global `tracing` subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Creates a config for the given level in the pretty format.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the configured level. Unknown or empty values fall back to `info`.
    #[must_use]
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` directives take precedence over the configured level. Fails
/// without panicking if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level_filter().into())
        .from_env_lossy();

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_parsing() {
        assert_eq!(LoggingConfig::new("error").level_filter(), LevelFilter::ERROR);
        assert_eq!(LoggingConfig::new("WARN").level_filter(), LevelFilter::WARN);
        assert_eq!(LoggingConfig::new("debug").level_filter(), LevelFilter::DEBUG);
        assert_eq!(LoggingConfig::new("trace").level_filter(), LevelFilter::TRACE);
        assert_eq!(LoggingConfig::new("").level_filter(), LevelFilter::INFO);
        assert_eq!(LoggingConfig::new("verbose").level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn test_logging_config_deserialize_defaults() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());

        let config: LoggingConfig =
            serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level_filter(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_second_init_fails_without_panicking() {
        let config = LoggingConfig::new("warn");
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
