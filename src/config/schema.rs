//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

use crate::handshake::profile::{ProfileOverrides, UpgradeProfile};

/// Root configuration for the upgrade bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP listener that hosts the upgrade dispatch table.
    pub listener: ListenerConfig,

    /// Root broker instances, each with acceptors and optional backups.
    pub brokers: Vec<BrokerConfig>,

    /// One entry per (broker, acceptor) pair with HTTP upgrade enabled.
    pub bridges: Vec<BridgeEntry>,

    /// Protocol strings for the primary and legacy bridges.
    pub protocols: ProtocolsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin introspection API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Listener name used as the key in the metadata registry.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A broker instance. Backups nest the same shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Instance name; empty for the unnamed primary.
    #[serde(default)]
    pub name: String,

    /// Whether the instance is currently the serving member.
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub acceptors: Vec<AcceptorConfig>,

    #[serde(default)]
    pub backups: Vec<BrokerConfig>,
}

/// A broker acceptor reachable over TCP.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcceptorConfig {
    /// Acceptor name, unique within its broker.
    pub name: String,

    /// Address of the broker's native acceptor (e.g., "127.0.0.1:61616").
    pub forward_address: String,

    /// Whether the acceptor's transport is started.
    #[serde(default = "default_true")]
    pub started: bool,
}

/// Enables HTTP upgrade for one acceptor of one root broker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BridgeEntry {
    /// Root broker name; empty selects the unnamed primary.
    #[serde(default)]
    pub broker: String,

    /// Acceptor name on that broker.
    pub acceptor: String,

    /// Also install the legacy protocol bridge.
    #[serde(default)]
    pub legacy: bool,
}

fn default_true() -> bool {
    true
}

/// Upgrade protocol profiles.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolsConfig {
    /// Fields given here replace the `activemq-remoting` defaults.
    #[serde(default = "UpgradeProfile::primary", deserialize_with = "primary_profile")]
    pub primary: UpgradeProfile,

    /// Fields given here replace the `hornetq-remoting` defaults.
    #[serde(default = "UpgradeProfile::legacy", deserialize_with = "legacy_profile")]
    pub legacy: UpgradeProfile,
}

fn primary_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UpgradeProfile, D::Error> {
    ProfileOverrides::deserialize(deserializer).map(|o| o.apply(UpgradeProfile::primary()))
}

fn legacy_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UpgradeProfile, D::Error> {
    ProfileOverrides::deserialize(deserializer).map(|o| o.apply(UpgradeProfile::legacy()))
}

impl Default for ProtocolsConfig {
    fn default() -> Self {
        Self {
            primary: UpgradeProfile::primary(),
            legacy: UpgradeProfile::legacy(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
