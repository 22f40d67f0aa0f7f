//! Immutable per-bridge upgrade registration.

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderName;

use crate::directory::BrokerInstance;
use crate::error::BridgeError;
use crate::handshake::digest::DigestEngine;
use crate::handshake::profile::UpgradeProfile;

/// Identity of a registration inside the shared dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationKey {
    pub protocol: String,
    pub broker: String,
    pub endpoint: String,
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.protocol, self.broker, self.endpoint)
    }
}

/// Resolved upgrade parameters for one (broker, acceptor) pair.
///
/// Header names are parsed and the magic validated up front, so everything
/// that can be wrong with the configuration fails here rather than during a
/// handshake.
#[derive(Debug)]
pub struct UpgradeRegistration {
    protocol: String,
    mechanism: String,
    key_header: HeaderName,
    accept_header: HeaderName,
    endpoint_header: HeaderName,
    broker_header: HeaderName,
    digest: DigestEngine,
    root: Arc<BrokerInstance>,
    endpoint: String,
}

impl UpgradeRegistration {
    pub fn new(
        profile: &UpgradeProfile,
        root: Arc<BrokerInstance>,
        endpoint: impl Into<String>,
    ) -> Result<Self, BridgeError> {
        if profile.protocol.trim().is_empty() {
            return Err(BridgeError::EmptyProtocol);
        }
        Ok(Self {
            protocol: profile.protocol.clone(),
            mechanism: profile.mechanism.clone(),
            key_header: parse_header(&profile.key_header)?,
            accept_header: parse_header(&profile.accept_header)?,
            endpoint_header: parse_header(&profile.endpoint_header)?,
            broker_header: parse_header(&profile.broker_header)?,
            digest: DigestEngine::new(&profile.protocol, profile.magic.clone())?,
            root,
            endpoint: endpoint.into(),
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn mechanism(&self) -> &str {
        &self.mechanism
    }

    pub fn key_header(&self) -> &HeaderName {
        &self.key_header
    }

    pub fn accept_header(&self) -> &HeaderName {
        &self.accept_header
    }

    pub fn endpoint_header(&self) -> &HeaderName {
        &self.endpoint_header
    }

    pub fn broker_header(&self) -> &HeaderName {
        &self.broker_header
    }

    pub fn digest(&self) -> &DigestEngine {
        &self.digest
    }

    /// The root broker instance this bridge was configured for.
    pub fn root(&self) -> &Arc<BrokerInstance> {
        &self.root
    }

    /// The acceptor name this bridge was configured for.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn key(&self) -> RegistrationKey {
        RegistrationKey {
            protocol: self.protocol.to_ascii_lowercase(),
            broker: self.root.name().to_string(),
            endpoint: self.endpoint.clone(),
        }
    }
}

fn parse_header(name: &str) -> Result<HeaderName, BridgeError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| BridgeError::InvalidHeaderName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_header_name() {
        let mut profile = UpgradeProfile::primary();
        profile.key_header = "bad header".into();
        let err = UpgradeRegistration::new(&profile, BrokerInstance::new("default"), "http-acceptor")
            .unwrap_err();
        assert_eq!(err, BridgeError::InvalidHeaderName("bad header".into()));
    }

    #[test]
    fn rejects_empty_protocol() {
        let mut profile = UpgradeProfile::legacy();
        profile.protocol = "  ".into();
        let err = UpgradeRegistration::new(&profile, BrokerInstance::new("default"), "http-acceptor")
            .unwrap_err();
        assert_eq!(err, BridgeError::EmptyProtocol);
    }

    #[test]
    fn key_is_case_insensitive_on_protocol() {
        let mut profile = UpgradeProfile::primary();
        profile.protocol = "ActiveMQ-Remoting".into();
        let registration =
            UpgradeRegistration::new(&profile, BrokerInstance::new("default"), "http-acceptor").unwrap();
        assert_eq!(registration.key().to_string(), "activemq-remoting@default/http-acceptor");
    }
}
