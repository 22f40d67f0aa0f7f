//! Endpoint directory subsystem.
//!
//! # Data Flow
//! ```text
//! BridgeConfig.brokers (startup)
//!     → BrokerDirectory (root instances by name)
//!     → broker.rs (BrokerInstance → AcceptorEndpoint, backups)
//!
//! Per request:
//!     headers → selector.rs → Target { broker, acceptor } | Mismatch
//! ```
//!
//! # Design Decisions
//! - Read-mostly: topology snapshots via arc-swap, flags via atomics
//! - Selection is a pure function of headers and the current snapshot

pub mod broker;
pub mod selector;

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::BrokerConfig;

pub use broker::{AcceptorEndpoint, AcceptorStatus, BrokerInstance, BrokerStatus};
pub use selector::{Mismatch, Target, TargetSelector};

/// Root broker instances known to this process, keyed by name.
#[derive(Debug, Default)]
pub struct BrokerDirectory {
    roots: DashMap<String, Arc<BrokerInstance>>,
}

impl BrokerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, root: Arc<BrokerInstance>) {
        self.roots.insert(root.name().to_string(), root);
    }

    pub fn get(&self, name: &str) -> Option<Arc<BrokerInstance>> {
        self.roots.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Sorted status of every root and its backups.
    pub fn status(&self) -> Vec<BrokerStatus> {
        let mut statuses: Vec<BrokerStatus> = self.roots.iter().map(|r| r.value().status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Apply `active`/`started` flags from a reloaded configuration.
    ///
    /// Instances and acceptors not already present are skipped; returns the
    /// number of skipped entries.
    pub fn apply_status(&self, brokers: &[BrokerConfig]) -> usize {
        let mut skipped = 0;
        for config in brokers {
            match self.get(&config.name) {
                Some(root) => skipped += apply_broker(&root, config),
                None => {
                    tracing::warn!(broker = %config.name, "Reloaded config names unknown broker; restart required");
                    skipped += 1;
                }
            }
        }
        skipped
    }
}

fn apply_broker(instance: &BrokerInstance, config: &BrokerConfig) -> usize {
    let mut skipped = 0;
    if instance.is_active() != config.active {
        tracing::info!(broker = %instance.name(), active = config.active, "Broker activity changed");
        instance.set_active(config.active);
    }
    for acceptor in &config.acceptors {
        match instance.acceptor(&acceptor.name) {
            Some(endpoint) => {
                if endpoint.is_transport_started() != acceptor.started {
                    tracing::info!(
                        broker = %instance.name(),
                        acceptor = %acceptor.name,
                        started = acceptor.started,
                        "Acceptor transport state changed"
                    );
                    endpoint.set_started(acceptor.started);
                }
            }
            None => {
                tracing::warn!(broker = %instance.name(), acceptor = %acceptor.name, "Unknown acceptor in reloaded config");
                skipped += 1;
            }
        }
    }
    for backup_config in &config.backups {
        match instance.resolve_backup(&backup_config.name) {
            Some(backup) => skipped += apply_broker(&backup, backup_config),
            None => {
                tracing::warn!(broker = %instance.name(), backup = %backup_config.name, "Unknown backup in reloaded config");
                skipped += 1;
            }
        }
    }
    skipped
}
