//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the broker topology from configuration
//! - Create the shared dispatch table and metadata registry
//! - Start one bridge per configured (broker, acceptor), plus the legacy
//!   bridge where enabled
//!
//! # Design Decisions
//! - Fail fast: any bridge start error stops the bridges already started
//!   and is returned to the caller
//! - Bridges start in configuration order, primary before legacy

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{BridgeConfig, BrokerConfig};
use crate::directory::{AcceptorEndpoint, BrokerDirectory, BrokerInstance};
use crate::error::BridgeError;
use crate::handshake::UpgradeProfile;
use crate::lifecycle::bridge::BridgeService;
use crate::registry::{ListenerMetadataRegistry, UpgradeDispatchTable};
use crate::transport::TcpForwardAcceptor;

/// Everything the server needs, assembled from one configuration.
#[derive(Debug)]
pub struct BridgeRuntime {
    pub listener: String,
    pub directory: Arc<BrokerDirectory>,
    pub dispatch: Arc<UpgradeDispatchTable>,
    pub metadata: Arc<ListenerMetadataRegistry>,
    pub bridges: Vec<BridgeService>,
    forwarders: Vec<Arc<TcpForwardAcceptor>>,
}

impl BridgeRuntime {
    /// Build topology and start every configured bridge.
    pub fn start(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Self::start_with(
            config,
            Arc::new(UpgradeDispatchTable::new()),
            Arc::new(ListenerMetadataRegistry::new()),
        )
    }

    /// Like `start`, installing into existing registries. On failure the
    /// registries are left as they were found.
    pub fn start_with(
        config: &BridgeConfig,
        dispatch: Arc<UpgradeDispatchTable>,
        metadata: Arc<ListenerMetadataRegistry>,
    ) -> Result<Self, BridgeError> {
        let mut forwarders = Vec::new();
        let directory = Arc::new(BrokerDirectory::new());
        for broker in &config.brokers {
            directory.insert(build_broker(broker, &mut forwarders)?);
        }

        let mut runtime = Self {
            listener: config.listener.name.clone(),
            directory,
            dispatch,
            metadata,
            bridges: Vec::new(),
            forwarders,
        };

        for entry in &config.bridges {
            let root = runtime
                .directory
                .get(&entry.broker)
                .ok_or_else(|| BridgeError::UnknownBroker(entry.broker.clone()));
            let result = root.and_then(|root| {
                if root.acceptor(&entry.acceptor).is_none() {
                    return Err(BridgeError::UnknownAcceptor {
                        broker: entry.broker.clone(),
                        acceptor: entry.acceptor.clone(),
                    });
                }
                let mut profiles = vec![config.protocols.primary.clone()];
                if entry.legacy {
                    profiles.push(config.protocols.legacy.clone());
                }
                for profile in profiles {
                    let bridge = runtime.bridge(profile, Arc::clone(&root), &entry.acceptor);
                    bridge.start()?;
                    runtime.bridges.push(bridge);
                }
                Ok(())
            });
            if let Err(e) = result {
                tracing::error!(broker = %entry.broker, acceptor = %entry.acceptor, error = %e, "Bridge startup failed");
                runtime.stop();
                return Err(e);
            }
        }

        tracing::info!(
            listener = %runtime.listener,
            bridges = runtime.bridges.len(),
            protocols = ?runtime.dispatch.protocols(),
            "Upgrade bridges ready"
        );
        Ok(runtime)
    }

    fn bridge(&self, profile: UpgradeProfile, root: Arc<BrokerInstance>, acceptor: &str) -> BridgeService {
        BridgeService::new(
            self.listener.clone(),
            profile,
            root,
            acceptor,
            self.dispatch.clone(),
            self.metadata.clone(),
        )
    }

    /// Stop every bridge, newest first, then close the forwarding acceptors.
    pub fn stop(&self) {
        for bridge in self.bridges.iter().rev() {
            bridge.stop();
        }
        for forwarder in &self.forwarders {
            forwarder.close();
        }
    }
}

fn build_broker(config: &BrokerConfig, forwarders: &mut Vec<Arc<TcpForwardAcceptor>>) -> Result<Arc<BrokerInstance>, BridgeError> {
    let instance = BrokerInstance::new(config.name.clone());
    for acceptor in &config.acceptors {
        let target: SocketAddr = acceptor
            .forward_address
            .parse()
            .map_err(|_| BridgeError::InvalidForwardAddress {
                acceptor: acceptor.name.clone(),
                address: acceptor.forward_address.clone(),
            })?;
        let forwarder = TcpForwardAcceptor::new(acceptor.name.clone(), target);
        forwarders.push(Arc::clone(&forwarder));
        let endpoint = AcceptorEndpoint::new(acceptor.name.clone(), forwarder);
        endpoint.set_started(acceptor.started);
        instance.add_acceptor(endpoint);
    }
    for backup in &config.backups {
        instance.add_backup(build_broker(backup, forwarders)?);
    }
    instance.set_active(config.active);
    Ok(instance)
}
