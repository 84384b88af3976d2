//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// An environment value that was present but could not be applied.
///
/// Loading happens before logging is set up, so these are handed back to
/// the caller to report once a subscriber exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub key: &'static str,
    pub value: String,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the runtime configuration from the process environment.
///
/// Reads the file named by `GATEWAY_CONFIG` when set (defaults otherwise),
/// then applies environment overrides and validates the result. Overrides
/// that could not be applied are returned alongside the config.
pub fn load_from_env() -> Result<(GatewayConfig, Vec<IgnoredOverride>), ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Same as [`load_from_env`] with an injectable variable lookup.
pub fn load_with<F>(lookup: F) -> Result<(GatewayConfig, Vec<IgnoredOverride>), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_PATH_ENV).filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    let ignored = apply_env_overrides(&mut config, &lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, ignored))
}

/// Overlay recognised environment variables onto `config`.
///
/// Blank values are ignored, so an exported-but-empty credential counts as
/// missing rather than as an empty string. Unparseable values are skipped
/// and returned.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Vec<IgnoredOverride>
where
    F: Fn(&str) -> Option<String>,
{
    let mut ignored = Vec::new();
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(addr) = get("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level.to_lowercase();
    }
    if let Some(raw) = get("USE_MOCK_WAREHOUSE") {
        match parse_flag(&raw) {
            Some(flag) => config.warehouse.use_mock = Some(flag),
            None => ignored.push(IgnoredOverride {
                key: "USE_MOCK_WAREHOUSE",
                value: raw,
            }),
        }
    }

    let wh = &mut config.warehouse;
    for (key, slot) in [
        ("WAREHOUSE_ACCOUNT", &mut wh.account),
        ("WAREHOUSE_USER", &mut wh.user),
        ("WAREHOUSE_PASSWORD", &mut wh.password),
        ("WAREHOUSE_DATABASE", &mut wh.database),
        ("WAREHOUSE_SCHEMA", &mut wh.schema),
        ("WAREHOUSE_NAME", &mut wh.warehouse),
        ("WAREHOUSE_ENDPOINT", &mut wh.endpoint),
    ] {
        if let Some(value) = get(key) {
            *slot = Some(value);
        }
    }

    if let Some(key) = get("GATEWAY_ADMIN_API_KEY") {
        config.admin.api_key = Some(key);
    }

    ignored
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let (config, ignored) = load_with(env(&[])).unwrap();
        assert!(ignored.is_empty());
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.warehouse.use_mock.is_none());
    }

    #[test]
    fn test_env_overrides_warehouse_settings() {
        let (config, _) = load_with(env(&[
            ("USE_MOCK_WAREHOUSE", "FALSE"),
            ("WAREHOUSE_ACCOUNT", "acme"),
            ("WAREHOUSE_USER", "svc"),
            ("WAREHOUSE_PASSWORD", "pw"),
            ("WAREHOUSE_DATABASE", "HR"),
            ("WAREHOUSE_SCHEMA", "PUBLIC"),
            ("WAREHOUSE_NAME", "COMPUTE_WH"),
            ("LOG_LEVEL", "DEBUG"),
        ]))
        .unwrap();

        assert_eq!(config.warehouse.use_mock, Some(false));
        assert_eq!(config.warehouse.account.as_deref(), Some("acme"));
        assert_eq!(config.warehouse.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_blank_and_bogus_values_are_ignored() {
        let (config, ignored) = load_with(env(&[
            ("WAREHOUSE_PASSWORD", "   "),
            ("USE_MOCK_WAREHOUSE", "maybe"),
        ]))
        .unwrap();

        assert!(config.warehouse.password.is_none());
        assert!(config.warehouse.use_mock.is_none());
        assert_eq!(
            ignored,
            vec![IgnoredOverride {
                key: "USE_MOCK_WAREHOUSE",
                value: "maybe".into(),
            }]
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = load_with(env(&[(CONFIG_PATH_ENV, "/nonexistent/gateway.toml")])).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_file_and_validate() {
        let path = std::env::temp_dir().join(format!("gateway-config-{}.toml", std::process::id()));
        fs::write(&path, "[circuit_breaker]\nfailure_threshold = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("circuit_breaker.failure_threshold"));

        fs::write(&path, "[circuit_breaker]\nfailure_threshold = 3\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_shipped_example_config_parses() {
        let config: GatewayConfig =
            toml::from_str(include_str!("../../config/gateway.example.toml")).unwrap();
        assert_eq!(config.warehouse.use_mock, Some(true));
        assert_eq!(config.circuit_breaker.half_open_max_probes, 1);
        assert!(validate_config(&config).is_ok());
    }
}
