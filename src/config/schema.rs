//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the wallet bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Relay (content-script side) settings.
    pub relay: RelayConfig,

    /// Privileged host settings.
    pub host: HostConfig,

    /// Wallet configuration pushed to pages.
    pub wallet: WalletConfig,

    /// Session endpoint and admin API.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Static name given to every port.
    pub port_name: String,

    /// Fixed delay before reconnecting a dropped port, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Health check interval, in milliseconds.
    pub health_check_interval_ms: u64,
}

impl RelayConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port_name: "wallet-provider-bridge".to_string(),
            reconnect_delay_ms: 1000,
            health_check_interval_ms: 5000,
        }
    }
}

/// Host configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Auto-reject pending decisions after this many seconds (0 = never).
    pub decision_timeout_secs: u64,

    /// How recent a health check must be for an origin to count as fresh.
    pub freshness_window_secs: u64,
}

impl HostConfig {
    pub fn decision_timeout(&self) -> Option<Duration> {
        (self.decision_timeout_secs > 0).then(|| Duration::from_secs(self.decision_timeout_secs))
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            decision_timeout_secs: 0,
            freshness_window_secs: 30,
        }
    }
}

/// A chain known to the wallet.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
}

/// Wallet configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WalletConfig {
    /// Active chain at startup.
    pub chain_id: u64,

    /// Known chains.
    pub chains: Vec<ChainConfig>,
}

impl WalletConfig {
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            chains: vec![ChainConfig {
                chain_id: 1,
                name: "Ethereum".to_string(),
                rpc_url: "http://localhost:8545".to_string(),
            }],
        }
    }
}

/// Session endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Enable the session/admin listener.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// API key for the admin routes (Bearer token).
    pub api_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8787".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.relay.port_name, "wallet-provider-bridge");
        assert_eq!(config.relay.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.host.decision_timeout(), None);
        assert!(config.wallet.chain(1).is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [relay]
            reconnect_delay_ms = 250

            [[wallet.chains]]
            chain_id = 1
            name = "Ethereum"
            rpc_url = "http://localhost:8545"

            [[wallet.chains]]
            chain_id = 8453
            name = "Base"
            rpc_url = "https://mainnet.base.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.relay.reconnect_delay_ms, 250);
        assert_eq!(config.relay.health_check_interval_ms, 5000);
        assert_eq!(config.wallet.chains.len(), 2);
        assert_eq!(config.wallet.chain(8453).unwrap().name, "Base");
    }

    #[test]
    fn test_decision_timeout() {
        let host = HostConfig {
            decision_timeout_secs: 30,
            ..HostConfig::default()
        };
        assert_eq!(host.decision_timeout(), Some(Duration::from_secs(30)));
    }
}
