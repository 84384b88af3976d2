//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::resilience::circuit_breaker::CircuitBreakerConfig;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Thresholds for the warehouse circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Warehouse connection settings and mock toggle.
    pub warehouse: WarehouseSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Warehouse connection settings.
///
/// Every connection field is optional; whatever is missing makes the client
/// fall back to the mock dataset instead of failing.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Force mock mode on (`true`) or off (`false`). Unset means real mode
    /// when credentials are present.
    pub use_mock: Option<bool>,

    /// Warehouse account identifier.
    pub account: Option<String>,

    /// Login user.
    pub user: Option<String>,

    /// Login password.
    pub password: Option<String>,

    /// Database name.
    pub database: Option<String>,

    /// Schema name.
    pub schema: Option<String>,

    /// Compute warehouse name.
    pub warehouse: Option<String>,

    /// Base URL of the SQL API. Derived from `account` when unset.
    pub endpoint: Option<String>,

    /// Timeout for each warehouse HTTP request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            use_mock: None,
            account: None,
            user: None,
            password: None,
            database: None,
            schema: None,
            warehouse: None,
            endpoint: None,
            request_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for WarehouseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSettings")
            .field("use_mock", &self.use_mock)
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("endpoint", &self.endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Serve Prometheus metrics on `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

/// Admin endpoint configuration.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required by admin routes. Unset leaves them open.
    pub api_key: Option<String>,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.timeout_secs, 60);
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert!(config.warehouse.use_mock.is_none());
        assert!(config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [circuit_breaker]
            failure_threshold = 3

            [warehouse]
            use_mock = true
            account = "acme"
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert_eq!(config.warehouse.use_mock, Some(true));
        assert_eq!(config.warehouse.account.as_deref(), Some("acme"));
        assert_eq!(config.warehouse.request_timeout_secs, 10);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = WarehouseSettings {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let admin = AdminConfig {
            api_key: Some("s3cret".into()),
        };
        assert!(!format!("{:?}", settings).contains("hunter2"));
        assert!(!format!("{:?}", admin).contains("s3cret"));
    }
}
