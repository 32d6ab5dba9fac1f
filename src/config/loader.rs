//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// `GATEWAY_*` environment variables are applied on top of the file
/// before validation.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from a variable lookup. Unparseable values are ignored
/// with a warning so a typo cannot silently zero a setting.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("GATEWAY_BIND_ADDRESS") {
        config.service.bind_address = value;
    }
    override_parsed(&lookup, "GATEWAY_REQUEST_TIMEOUT_MS", &mut config.service.request_timeout_ms);

    if let Some(value) = lookup("GATEWAY_UPSTREAM_NAME") {
        config.upstream.name = value;
    }
    if let Some(value) = lookup("GATEWAY_VERIFY_URL") {
        config.upstream.verify_url = value;
    }
    if let Some(value) = lookup("GATEWAY_CA_BUNDLE") {
        config.upstream.ca_bundle_path = value;
    }

    override_parsed(&lookup, "GATEWAY_TRIP_THRESHOLD", &mut config.breaker.trip_threshold);
    override_parsed(&lookup, "GATEWAY_COOL_DOWN_MS", &mut config.breaker.cool_down_ms);
    override_parsed(&lookup, "GATEWAY_MAX_ATTEMPTS", &mut config.retries.max_attempts);
    override_parsed(&lookup, "GATEWAY_BACKOFF_MS", &mut config.retries.backoff_ms);
    override_parsed(&lookup, "GATEWAY_ATTEMPT_TIMEOUT_MS", &mut config.timeouts.attempt_ms);

    if let Some(value) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = value;
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.parse::<T>() {
            Ok(parsed) => *slot = parsed,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable environment override")
            }
        }
    }
}
