//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (delays > 0, addresses parse)
//! - Check the active chain is one of the known chains
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.relay.port_name.trim().is_empty() {
        errors.push(ValidationError::new("relay.port_name", "must not be empty"));
    }
    if config.relay.reconnect_delay_ms == 0 {
        errors.push(ValidationError::new("relay.reconnect_delay_ms", "must be > 0"));
    }
    if config.relay.health_check_interval_ms == 0 {
        errors.push(ValidationError::new("relay.health_check_interval_ms", "must be > 0"));
    }

    let mut seen = HashSet::new();
    for chain in &config.wallet.chains {
        if !seen.insert(chain.chain_id) {
            errors.push(ValidationError::new(
                "wallet.chains",
                format!("duplicate chain_id {}", chain.chain_id),
            ));
        }
        if url::Url::parse(&chain.rpc_url).is_err() {
            errors.push(ValidationError::new(
                "wallet.chains",
                format!("invalid rpc_url '{}' for chain {}", chain.rpc_url, chain.chain_id),
            ));
        }
    }
    if config.wallet.chain(config.wallet.chain_id).is_none() {
        errors.push(ValidationError::new(
            "wallet.chain_id",
            format!("chain {} is not listed in wallet.chains", config.wallet.chain_id),
        ));
    }

    if config.session.enabled {
        if config.session.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "session.bind_address",
                format!("'{}' is not a socket address", config.session.bind_address),
            ));
        }
        if config.session.api_key.is_empty() {
            errors.push(ValidationError::new("session.api_key", "must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
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
    use crate::config::schema::ChainConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = BridgeConfig::default();
        config.relay.port_name = " ".into();
        config.relay.reconnect_delay_ms = 0;
        config.wallet.chain_id = 10;
        config.session.bind_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "relay.port_name",
                "relay.reconnect_delay_ms",
                "wallet.chain_id",
                "session.bind_address"
            ]
        );
    }

    #[test]
    fn test_duplicate_chain() {
        let mut config = BridgeConfig::default();
        config.wallet.chains.push(ChainConfig {
            chain_id: 1,
            name: "Again".into(),
            rpc_url: "http://localhost:8546".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate"));
    }

    #[test]
    fn test_disabled_session_skips_address_check() {
        let mut config = BridgeConfig::default();
        config.session.enabled = false;
        config.session.bind_address = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
