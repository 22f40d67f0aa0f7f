//! Listener upgrade metadata for operational introspection.

use dashmap::DashMap;
use serde::Serialize;

/// One advertised upgrade protocol on a listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UpgradeMetadata {
    pub protocol: String,
    pub mechanism: String,
}

/// Registration surface of the listener metadata registry.
pub trait ListenerRegistry: Send + Sync {
    fn add_upgrade_metadata(&self, listener: &str, metadata: UpgradeMetadata);

    /// Remove one matching entry. Returns whether it was present.
    fn remove_upgrade_metadata(&self, listener: &str, metadata: &UpgradeMetadata) -> bool;
}

/// Listener entry as exposed by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerUpgrade {
    pub listener: String,
    pub protocol: String,
    pub mechanism: String,
}

/// In-memory metadata registry keyed by listener name.
///
/// Entries are counted: two bridges publishing the same protocol on one
/// listener leave it advertised until both have removed theirs.
#[derive(Debug, Default)]
pub struct ListenerMetadataRegistry {
    listeners: DashMap<String, Vec<UpgradeMetadata>>,
}

impl ListenerMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upgrade_metadata(&self, listener: &str) -> Vec<UpgradeMetadata> {
        self.listeners
            .get(listener)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    /// Every entry on every listener, deduplicated and sorted.
    pub fn all(&self) -> Vec<ListenerUpgrade> {
        let mut all: Vec<ListenerUpgrade> = self
            .listeners
            .iter()
            .flat_map(|entry| {
                let listener = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|m| ListenerUpgrade {
                        listener: listener.clone(),
                        protocol: m.protocol.clone(),
                        mechanism: m.mechanism.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        all.sort_by(|a, b| (&a.listener, &a.protocol).cmp(&(&b.listener, &b.protocol)));
        all.dedup();
        all
    }
}

impl ListenerRegistry for ListenerMetadataRegistry {
    fn add_upgrade_metadata(&self, listener: &str, metadata: UpgradeMetadata) {
        self.listeners.entry(listener.to_string()).or_default().push(metadata);
    }

    fn remove_upgrade_metadata(&self, listener: &str, metadata: &UpgradeMetadata) -> bool {
        let mut removed = false;
        let mut now_empty = false;
        if let Some(mut entries) = self.listeners.get_mut(listener) {
            if let Some(index) = entries.iter().position(|m| m == metadata) {
                entries.remove(index);
                removed = true;
            }
            now_empty = entries.is_empty();
        }
        if now_empty {
            self.listeners.remove_if(listener, |_, entries| entries.is_empty());
        }
        removed
    }
}
