//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges. All problems are reported
//! together, not just the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, returning every violation found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let cb = &config.circuit_breaker;

    if cb.failure_threshold < 1 {
        errors.push(ValidationError {
            field: "circuit_breaker.failure_threshold",
            message: "must be at least 1".to_string(),
        });
    }
    if cb.success_threshold < 1 {
        errors.push(ValidationError {
            field: "circuit_breaker.success_threshold",
            message: "must be at least 1".to_string(),
        });
    }
    if cb.half_open_max_probes < 1 {
        errors.push(ValidationError {
            field: "circuit_breaker.half_open_max_probes",
            message: "must be at least 1".to_string(),
        });
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "listener.request_timeout_secs",
            message: "must be greater than 0".to_string(),
        });
    }
    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError {
            field: "observability.log_level",
            message: "must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
