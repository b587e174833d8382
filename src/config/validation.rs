//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.rule_cache.ttl_secs == 0 {
        errors.push(ValidationError::new("rule_cache.ttl_secs", "must be greater than 0"));
    }

    if config.rule_cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rule_cache.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.forwarding.default_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "forwarding.default_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.subdomain.enabled {
        let base = config.subdomain.base_domain.trim_matches('.');
        if base.is_empty() || !base.contains('.') {
            errors.push(ValidationError::new(
                "subdomain.base_domain",
                "required when subdomain routing is enabled",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_subdomain_requires_base_domain() {
        let mut config = ProxyConfig::default();
        config.subdomain.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "subdomain.base_domain");

        config.subdomain.base_domain = "preview.example.com".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
