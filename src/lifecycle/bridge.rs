//! Bridge service lifecycle.
//!
//! # Responsibilities
//! - Build the registration for one (broker, acceptor, profile) triple
//! - Install it into the dispatch table and publish listener metadata
//! - Remove both again on stop, metadata first
//!
//! # Design Decisions
//! - `start` and `stop` are idempotent
//! - `stop` never fails: it is best-effort cleanup and tolerates the
//!   downstream entries already being gone

use std::sync::{Arc, Mutex, MutexGuard};

use crate::directory::BrokerInstance;
use crate::error::BridgeError;
use crate::handshake::profile::UpgradeProfile;
use crate::handshake::registration::{RegistrationKey, UpgradeRegistration};
use crate::observability::metrics;
use crate::registry::{ListenerRegistry, UpgradeHandler, UpgradeMetadata, UpgradeRegistry};

#[derive(Debug)]
struct Installed {
    handler: Arc<UpgradeHandler>,
    metadata: UpgradeMetadata,
}

/// One HTTP-upgrade bridge: a profile bound to a broker's acceptor on a listener.
pub struct BridgeService {
    listener: String,
    profile: UpgradeProfile,
    root: Arc<BrokerInstance>,
    endpoint: String,
    dispatch: Arc<dyn UpgradeRegistry>,
    listeners: Arc<dyn ListenerRegistry>,
    installed: Mutex<Option<Installed>>,
}

impl BridgeService {
    pub fn new(
        listener: impl Into<String>,
        profile: UpgradeProfile,
        root: Arc<BrokerInstance>,
        endpoint: impl Into<String>,
        dispatch: Arc<dyn UpgradeRegistry>,
        listeners: Arc<dyn ListenerRegistry>,
    ) -> Self {
        Self {
            listener: listener.into(),
            profile,
            root,
            endpoint: endpoint.into(),
            dispatch,
            listeners,
            installed: Mutex::new(None),
        }
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }

    pub fn protocol(&self) -> &str {
        &self.profile.protocol
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_started(&self) -> bool {
        self.lock().is_some()
    }

    /// Key of the installed registration, if started.
    pub fn key(&self) -> Option<RegistrationKey> {
        self.lock().as_ref().map(|i| i.handler.key().clone())
    }

    /// Install the registration. No-op if already started.
    pub fn start(&self) -> Result<(), BridgeError> {
        let mut installed = self.lock();
        if installed.is_some() {
            tracing::debug!(protocol = %self.profile.protocol, endpoint = %self.endpoint, "Bridge already started");
            return Ok(());
        }

        let registration = UpgradeRegistration::new(&self.profile, Arc::clone(&self.root), self.endpoint.clone())?;
        let metadata = UpgradeMetadata {
            protocol: registration.protocol().to_string(),
            mechanism: registration.mechanism().to_string(),
        };
        let handler = Arc::new(UpgradeHandler::new(Arc::new(registration)));

        self.dispatch.register_protocol(Arc::clone(&handler))?;
        self.listeners.add_upgrade_metadata(&self.listener, metadata.clone());
        metrics::adjust_registrations(&self.listener, 1.0);

        tracing::info!(
            listener = %self.listener,
            protocol = %self.profile.protocol,
            broker = %self.root.name(),
            endpoint = %self.endpoint,
            "HTTP upgrade bridge started"
        );
        *installed = Some(Installed { handler, metadata });
        Ok(())
    }

    /// Remove the registration. No-op if not started.
    pub fn stop(&self) {
        let Some(installed) = self.lock().take() else {
            return;
        };

        if !self.listeners.remove_upgrade_metadata(&self.listener, &installed.metadata) {
            tracing::debug!(listener = %self.listener, protocol = %installed.metadata.protocol, "Upgrade metadata already removed");
        }
        if !self.dispatch.deregister_protocol(installed.handler.key()) {
            tracing::debug!(registration = %installed.handler.key(), "Upgrade registration already removed");
        }
        metrics::adjust_registrations(&self.listener, -1.0);

        tracing::info!(
            listener = %self.listener,
            protocol = %self.profile.protocol,
            broker = %self.root.name(),
            endpoint = %self.endpoint,
            "HTTP upgrade bridge stopped"
        );
    }

    fn lock(&self) -> MutexGuard<'_, Option<Installed>> {
        self.installed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeService")
            .field("listener", &self.listener)
            .field("protocol", &self.profile.protocol)
            .field("broker", &self.root.name())
            .field("endpoint", &self.endpoint)
            .field("started", &self.is_started())
            .finish()
    }
}
