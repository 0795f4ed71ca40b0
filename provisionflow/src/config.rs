//! Service configuration.
//!
//! Configuration is JSON. It is read from the `API_CONFIG` environment
//! variable when set (base64 or raw JSON), otherwise from a file.

use crate::compensation::{DeadlinePolicy, RollbackExecutor};
use crate::errors::ConfigError;
use crate::observability::LoggingConfig;
use crate::retry::{Retrier, RetryPolicy};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable holding an inline configuration.
pub const CONFIG_ENV_VAR: &str = "API_CONFIG";

/// Configuration file read when [`CONFIG_ENV_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Top-level configuration.
///
/// Keys are snake_case; the PascalCase names used by older deployments are
/// accepted as aliases.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Address the service listens on.
    #[serde(default = "default_listen_address", alias = "ListenAddress")]
    pub listen_address: String,
    /// Organization the service provisions for.
    #[serde(default, alias = "Org")]
    pub org: String,
    /// Legacy log level, used when `logging.level` is not set.
    #[serde(default, alias = "LogLevel")]
    pub log_level: Option<String>,
    /// Shared secret for API clients.
    #[serde(default, alias = "Token")]
    pub token: Option<String>,
    /// Cloud account the workflows act on.
    #[serde(default, alias = "Account")]
    pub account: AccountConfig,
    /// Rollback settings.
    #[serde(default)]
    pub rollback: RollbackConfig,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Logging settings.
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_listen_address() -> String {
    ":8080".to_string()
}

/// Cloud account credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Service endpoint override.
    #[serde(default, alias = "Endpoint")]
    pub endpoint: Option<String>,
    /// External id used when assuming the role.
    #[serde(default, alias = "ExternalID")]
    pub external_id: Option<String>,
    /// Access key id.
    #[serde(default, alias = "Akid")]
    pub akid: Option<String>,
    /// Secret access key.
    #[serde(default, alias = "Secret")]
    pub secret: Option<String>,
    /// Region.
    #[serde(default, alias = "Region")]
    pub region: Option<String>,
    /// Role to assume.
    #[serde(default, alias = "Role")]
    pub role: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("endpoint", &self.endpoint)
            .field("external_id", &redact(self.external_id.as_deref()))
            .field("akid", &self.akid)
            .field("secret", &redact(self.secret.as_deref()))
            .field("region", &self.region)
            .field("role", &self.role)
            .finish()
    }
}

impl std::fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("listen_address", &self.listen_address)
            .field("org", &self.org)
            .field("log_level", &self.log_level)
            .field("token", &redact(self.token.as_deref()))
            .field("account", &self.account)
            .field("rollback", &self.rollback)
            .field("retry", &self.retry)
            .field("logging", &self.logging)
            .finish()
    }
}

fn redact(value: Option<&str>) -> Option<&'static str> {
    value.map(|_| "<redacted>")
}

/// Largest accepted `rollback.deadline_secs` (one day).
pub const MAX_ROLLBACK_DEADLINE_SECS: u64 = 86_400;

/// Rollback settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackConfig {
    /// How long callers wait for a rollback, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// What happens to unstarted undo actions at the deadline.
    #[serde(default)]
    pub on_deadline: DeadlinePolicy,
}

fn default_deadline_secs() -> u64 {
    120
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            on_deadline: DeadlinePolicy::default(),
        }
    }
}

impl RollbackConfig {
    /// Returns the deadline as a duration.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl ProvisionConfig {
    /// Parses and validates a JSON document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialization cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org.trim().is_empty() {
            return Err(ConfigError::invalid("'org' cannot be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("'retry.max_attempts' must be at least 1"));
        }
        if self.rollback.deadline_secs == 0 {
            return Err(ConfigError::invalid(
                "'rollback.deadline_secs' must be greater than 0",
            ));
        }
        if self.rollback.deadline_secs > MAX_ROLLBACK_DEADLINE_SECS {
            return Err(ConfigError::invalid(format!(
                "'rollback.deadline_secs' must be at most {MAX_ROLLBACK_DEADLINE_SECS}"
            )));
        }
        Ok(())
    }

    /// Returns the logging settings, falling back to the legacy `log_level`.
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig {
        match (&self.logging, &self.log_level) {
            (Some(logging), _) => logging.clone(),
            (None, Some(level)) => LoggingConfig::new(level.clone()),
            (None, None) => LoggingConfig::default(),
        }
    }

    /// Builds a rollback executor from the rollback settings.
    #[must_use]
    pub fn rollback_executor(&self) -> RollbackExecutor {
        RollbackExecutor::new(self.rollback.deadline()).with_policy(self.rollback.on_deadline)
    }

    /// Builds a retrier from the retry settings.
    #[must_use]
    pub fn retrier(&self) -> Retrier {
        Retrier::new(self.retry)
    }
}

/// Decodes the value of [`CONFIG_ENV_VAR`].
///
/// Base64 (standard alphabet) is tried first; a value that does not decode
/// is taken as raw JSON.
#[must_use]
pub fn decode_env_config(value: &str) -> Vec<u8> {
    match STANDARD.decode(value.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "{} is not base64 encoded", CONFIG_ENV_VAR);
            value.as_bytes().to_vec()
        }
    }
}

/// Loads configuration from the environment or from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<ProvisionConfig, ConfigError> {
    load_from(std::env::var(CONFIG_ENV_VAR).ok(), path)
}

/// Loads configuration from an explicit environment value or from `path`.
///
/// An empty `env_value` counts as unset.
pub fn load_from(
    env_value: Option<String>,
    path: impl AsRef<Path>,
) -> Result<ProvisionConfig, ConfigError> {
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        info!("reading configuration from {} environment", CONFIG_ENV_VAR);
        return ProvisionConfig::from_slice(&decode_env_config(&value));
    }

    let path = path.as_ref();
    info!(path = %path.display(), "reading configuration from file");
    let file = std::fs::File::open(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ProvisionConfig::from_reader(std::io::BufReader::new(file))
}

/// Build metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Crate version.
    pub version: String,
    /// Git commit, if provided at build time through `GIT_HASH`.
    pub git_hash: Option<String>,
    /// Build timestamp, if provided at build time through `BUILD_STAMP`.
    pub build_stamp: Option<String>,
}

impl VersionInfo {
    /// Returns the metadata of this build.
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_hash: option_env!("GIT_HASH").map(str::to_string),
            build_stamp: option_env!("BUILD_STAMP").map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{"org": "acme"}"#;

    #[test]
    fn test_defaults() {
        let config = ProvisionConfig::from_slice(MINIMAL.as_bytes()).unwrap();

        assert_eq!(config.listen_address, ":8080");
        assert_eq!(config.rollback.deadline(), Duration::from_secs(120));
        assert_eq!(config.rollback.on_deadline, DeadlinePolicy::ContinueSweep);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.logging_config(), LoggingConfig::default());
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "listen_address": "0.0.0.0:9000",
            "org": "acme",
            "token": "s3cr3t",
            "account": {"akid": "AKIA1", "secret": "shh", "region": "us-east-1"},
            "rollback": {"deadline_secs": 30, "on_deadline": "abandon_remaining"},
            "retry": {"max_attempts": 5, "initial_delay_ms": 250},
            "logging": {"level": "debug", "format": "json"}
        }"#;

        let config = ProvisionConfig::from_slice(json.as_bytes()).unwrap();

        assert_eq!(config.account.region.as_deref(), Some("us-east-1"));
        let executor = config.rollback_executor();
        assert_eq!(executor.deadline(), Duration::from_secs(30));
        assert_eq!(executor.policy(), DeadlinePolicy::AbandonRemaining);
        assert_eq!(config.retrier().policy().max_attempts, 5);
        assert_eq!(config.retrier().policy().initial_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_legacy_keys() {
        let json = r#"{"ListenAddress": ":80", "Org": "acme", "LogLevel": "warn",
                       "Account": {"Akid": "AKIA1", "ExternalID": "ext"}}"#;

        let config = ProvisionConfig::from_slice(json.as_bytes()).unwrap();

        assert_eq!(config.listen_address, ":80");
        assert_eq!(config.account.external_id.as_deref(), Some("ext"));
        assert_eq!(config.logging_config().level, "warn");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let json = r#"{"org": "acme", "token": "tok-123", "account": {"secret": "shh-456"}}"#;
        let config = ProvisionConfig::from_slice(json.as_bytes()).unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("shh-456"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_validation() {
        let err = ProvisionConfig::from_slice(b"{}").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ProvisionConfig::from_slice(br#"{"org": "a", "retry": {"max_attempts": 0}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("max_attempts"));

        let err =
            ProvisionConfig::from_slice(br#"{"org": "a", "rollback": {"deadline_secs": 0}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("deadline_secs"));

        let err = ProvisionConfig::from_slice(
            br#"{"org": "a", "rollback": {"deadline_secs": 18446744073709551615}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most 86400"));
    }

    #[test]
    fn test_decode_error() {
        let err = ProvisionConfig::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn test_env_value_base64_or_raw() {
        let encoded = STANDARD.encode(MINIMAL);
        assert_eq!(decode_env_config(&encoded), MINIMAL.as_bytes());
        assert_eq!(decode_env_config(MINIMAL), MINIMAL.as_bytes());
    }

    #[test]
    fn test_load_prefers_env_value() {
        let encoded = STANDARD.encode(r#"{"org": "from-env"}"#);
        let config = load_from(Some(encoded), "does/not/exist.json").unwrap();
        assert_eq!(config.org, "from-env");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"org": "from-file"}}"#).unwrap();

        let config = load_from(Some(String::new()), file.path()).unwrap();
        assert_eq!(config.org, "from-file");
    }

    #[test]
    fn test_missing_file() {
        let err = load_from(None, "does/not/exist.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn test_version_info() {
        let version = VersionInfo::current();
        assert_eq!(version.version, env!("CARGO_PKG_VERSION"));
    }
}
