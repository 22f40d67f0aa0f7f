//! Target selection for upgrade requests.
//!
//! # Responsibilities
//! - Pick the broker instance a request is destined for (root or backup)
//! - Pick the acceptor on that instance
//! - Decide "not my request" when headers point at another bridge
//!
//! # Design Decisions
//! - Pure over (headers, current topology snapshot); no caching, so the
//!   handshake and the hand-off each observe current state
//! - Absent selector headers mean the configured defaults

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::directory::broker::{AcceptorEndpoint, BrokerInstance};
use crate::handshake::registration::UpgradeRegistration;

/// Resolved destination of an upgrade request.
#[derive(Debug, Clone)]
pub struct Target {
    pub broker: Arc<BrokerInstance>,
    pub acceptor: Arc<AcceptorEndpoint>,
}

impl Target {
    /// Broker active and acceptor transport started.
    pub fn is_available(&self) -> bool {
        self.broker.is_active() && self.acceptor.is_transport_started()
    }
}

/// Why a request does not belong to this bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Endpoint selector names another acceptor.
    Endpoint(String),
    /// Broker selector names neither the root nor any of its backups.
    Broker(String),
    /// The selected broker has no acceptor with the configured name.
    AcceptorMissing { broker: String },
}

/// Applies the selection rules of one registration.
#[derive(Debug, Clone, Copy)]
pub struct TargetSelector<'a> {
    registration: &'a UpgradeRegistration,
}

impl<'a> TargetSelector<'a> {
    pub fn new(registration: &'a UpgradeRegistration) -> Self {
        Self { registration }
    }

    /// Broker named by the broker selector header, or the root when absent.
    pub fn select_broker(&self, headers: &HeaderMap) -> Option<Arc<BrokerInstance>> {
        let root = self.registration.root();
        let Some(value) = headers.get(self.registration.broker_header()) else {
            return Some(Arc::clone(root));
        };
        let name = value.to_str().ok()?;
        if name == root.name() {
            return Some(Arc::clone(root));
        }
        root.resolve_backup(name)
    }

    /// This bridge's acceptor on `broker`, unless the endpoint selector
    /// header names a different acceptor.
    pub fn select_acceptor(&self, broker: &BrokerInstance, headers: &HeaderMap) -> Option<Arc<AcceptorEndpoint>> {
        if self.endpoint_mismatch(headers).is_some() {
            return None;
        }
        broker.acceptor(self.registration.endpoint())
    }

    /// Both selections, with the reason when the request is not ours.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Target, Mismatch> {
        if let Some(requested) = self.endpoint_mismatch(headers) {
            return Err(Mismatch::Endpoint(requested));
        }
        let broker = self.select_broker(headers).ok_or_else(|| {
            let requested = headers
                .get(self.registration.broker_header())
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_default();
            Mismatch::Broker(requested)
        })?;
        let acceptor = self.select_acceptor(&broker, headers).ok_or_else(|| Mismatch::AcceptorMissing {
            broker: broker.name().to_string(),
        })?;
        Ok(Target { broker, acceptor })
    }

    fn endpoint_mismatch(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(self.registration.endpoint_header())?;
        match value.to_str() {
            Ok(requested) if requested == self.registration.endpoint() => None,
            _ => Some(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        }
    }
}
