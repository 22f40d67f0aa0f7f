//! Connection hand-off after a completed upgrade.
//!
//! # Responsibilities
//! - Re-resolve the target against current topology
//! - Close the connection if the target vanished or went inactive
//! - Wrap the raw connection and transfer it to the acceptor
//! - Resume reads so the acceptor's event loop takes over
//!
//! # Design Decisions
//! - A `HandoffTicket` exists only for an accepted handshake and is consumed
//!   by `on_upgraded`, so a connection can be handed off at most once
//! - The raw connection is moved in and never retained: it ends up owned
//!   by the acceptor or dropped (closed)

use std::sync::Arc;

use crate::directory::selector::{Mismatch, TargetSelector};
use crate::handshake::registration::{RegistrationKey, UpgradeRegistration};
use crate::handshake::validator::HandshakeContext;
use crate::observability::metrics;
use crate::transport::channel::{ByteChannel, ConnectionId, RawConnection};

/// Proof of an accepted handshake, redeemable for one hand-off.
#[derive(Debug)]
pub struct HandoffTicket {
    key: RegistrationKey,
    context: HandshakeContext,
}

impl HandoffTicket {
    pub(crate) fn new(key: RegistrationKey, context: HandshakeContext) -> Self {
        Self { key, context }
    }

    pub fn key(&self) -> &RegistrationKey {
        &self.key
    }

    pub fn context(&self) -> &HandshakeContext {
        &self.context
    }
}

/// Why an upgraded connection was closed instead of transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Ticket was issued by another registration.
    ForeignTicket,
    /// Headers no longer resolve to a target.
    TargetUnresolved(Mismatch),
    /// Target stopped serving between handshake and hand-off.
    TargetInactive,
    /// The acceptor refused the connection.
    TransferFailed(String),
}

impl CloseReason {
    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::ForeignTicket => "foreign_ticket",
            CloseReason::TargetUnresolved(_) => "target_unresolved",
            CloseReason::TargetInactive => "target_inactive",
            CloseReason::TransferFailed(_) => "transfer_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    Transferred {
        connection_id: ConnectionId,
        broker: String,
        acceptor: String,
    },
    Closed(CloseReason),
}

impl HandoffOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            HandoffOutcome::Transferred { .. } => "transferred",
            HandoffOutcome::Closed(reason) => reason.label(),
        }
    }
}

/// Transfers upgraded connections for one registration.
#[derive(Debug, Clone)]
pub struct HandoffCoordinator {
    registration: Arc<UpgradeRegistration>,
}

impl HandoffCoordinator {
    pub fn new(registration: Arc<UpgradeRegistration>) -> Self {
        Self { registration }
    }

    /// Hand `raw` to the acceptor selected by the ticket's headers.
    pub fn on_upgraded<R: RawConnection>(&self, ticket: HandoffTicket, raw: R) -> HandoffOutcome {
        let outcome = self.transfer(ticket, raw);
        metrics::record_handoff(self.registration.protocol(), outcome.label());
        outcome
    }

    fn transfer<R: RawConnection>(&self, ticket: HandoffTicket, raw: R) -> HandoffOutcome {
        let registration = &*self.registration;
        if *ticket.key() != registration.key() {
            tracing::warn!(ticket = %ticket.key(), registration = %registration.key(), "Hand-off with foreign ticket");
            return HandoffOutcome::Closed(CloseReason::ForeignTicket);
        }

        let target = match TargetSelector::new(registration).resolve(ticket.context().headers()) {
            Ok(target) => target,
            Err(mismatch) => {
                tracing::debug!(
                    protocol = %registration.protocol(),
                    mismatch = ?mismatch,
                    "Upgrade target vanished before hand-off, closing"
                );
                return HandoffOutcome::Closed(CloseReason::TargetUnresolved(mismatch));
            }
        };

        if !target.is_available() {
            tracing::debug!(
                protocol = %registration.protocol(),
                broker = %target.broker.name(),
                acceptor = %target.acceptor.name(),
                "Upgrade target went inactive before hand-off, closing"
            );
            return HandoffOutcome::Closed(CloseReason::TargetInactive);
        }

        let channel = ByteChannel::new(registration.protocol(), raw);
        let connection_id = channel.id();
        let acceptor = target.acceptor.acceptor();

        if let Err(e) = acceptor.transfer_connection(channel) {
            tracing::warn!(
                protocol = %registration.protocol(),
                broker = %target.broker.name(),
                acceptor = %target.acceptor.name(),
                connection_id = %connection_id,
                error = %e,
                "Connection transfer failed"
            );
            return HandoffOutcome::Closed(CloseReason::TransferFailed(e.to_string()));
        }
        acceptor.resume_reads(connection_id);

        tracing::debug!(
            protocol = %registration.protocol(),
            broker = %target.broker.name(),
            acceptor = %target.acceptor.name(),
            connection_id = %connection_id,
            "Connection handed off"
        );
        HandoffOutcome::Transferred {
            connection_id,
            broker: target.broker.name().to_string(),
            acceptor: target.acceptor.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::broker::{AcceptorEndpoint, BrokerInstance};
    use crate::handshake::profile::UpgradeProfile;
    use crate::transport::testing::RecordingAcceptor;
    use axum::http::{HeaderMap, HeaderName, HeaderValue};
    use tokio::io::AsyncReadExt;

    struct Fixture {
        root: Arc<BrokerInstance>,
        acceptor: Arc<RecordingAcceptor>,
        registration: Arc<UpgradeRegistration>,
    }

    fn fixture() -> Fixture {
        let root = BrokerInstance::new("default");
        let acceptor = RecordingAcceptor::new();
        let endpoint = AcceptorEndpoint::new("http-acceptor", acceptor.clone());
        endpoint.set_started(true);
        root.add_acceptor(endpoint);
        root.set_active(true);
        let registration = Arc::new(
            UpgradeRegistration::new(&UpgradeProfile::primary(), root.clone(), "http-acceptor").unwrap(),
        );
        Fixture { root, acceptor, registration }
    }

    fn ticket(registration: &UpgradeRegistration, pairs: &[(&str, &str)]) -> HandoffTicket {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        HandoffTicket::new(registration.key(), HandshakeContext::new(headers))
    }

    #[tokio::test]
    async fn transfers_exactly_once_and_resumes_reads() {
        let f = fixture();
        let coordinator = HandoffCoordinator::new(f.registration.clone());
        let (_client, server) = tokio::io::duplex(64);

        let outcome = coordinator.on_upgraded(ticket(&f.registration, &[]), server);

        let HandoffOutcome::Transferred { connection_id, broker, acceptor } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(broker, "default");
        assert_eq!(acceptor, "http-acceptor");
        assert_eq!(f.acceptor.transfers(), 1);
        assert_eq!(f.acceptor.held(), 1);
        assert_eq!(f.acceptor.resumed(), vec![connection_id]);
    }

    #[tokio::test]
    async fn closes_when_target_went_inactive() {
        let f = fixture();
        let coordinator = HandoffCoordinator::new(f.registration.clone());
        let (mut client, server) = tokio::io::duplex(64);
        f.root.set_active(false);

        let outcome = coordinator.on_upgraded(ticket(&f.registration, &[]), server);

        assert_eq!(outcome, HandoffOutcome::Closed(CloseReason::TargetInactive));
        assert_eq!(f.acceptor.transfers(), 0);
        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn closes_on_endpoint_mismatch() {
        let f = fixture();
        let coordinator = HandoffCoordinator::new(f.registration.clone());
        let (_client, server) = tokio::io::duplex(64);

        let outcome = coordinator.on_upgraded(
            ticket(&f.registration, &[("httpUpgradeEndpoint", "other-acceptor")]),
            server,
        );

        assert_eq!(
            outcome,
            HandoffOutcome::Closed(CloseReason::TargetUnresolved(Mismatch::Endpoint("other-acceptor".into())))
        );
        assert_eq!(f.acceptor.transfers(), 0);
    }

    #[tokio::test]
    async fn hands_off_to_backup_acceptor() {
        let f = fixture();
        let backup = BrokerInstance::new("backup1");
        let backup_acceptor = RecordingAcceptor::new();
        let endpoint = AcceptorEndpoint::new("http-acceptor", backup_acceptor.clone());
        endpoint.set_started(true);
        backup.add_acceptor(endpoint);
        backup.set_active(true);
        f.root.add_backup(backup);
        let coordinator = HandoffCoordinator::new(f.registration.clone());
        let (_client, server) = tokio::io::duplex(64);

        let outcome = coordinator.on_upgraded(
            ticket(&f.registration, &[("activemq-server-name", "backup1")]),
            server,
        );

        assert!(matches!(outcome, HandoffOutcome::Transferred { ref broker, .. } if broker == "backup1"));
        assert_eq!(backup_acceptor.transfers(), 1);
        assert_eq!(f.acceptor.transfers(), 0);
    }

    #[tokio::test]
    async fn refused_transfer_closes_connection() {
        let root = BrokerInstance::new("default");
        let acceptor = RecordingAcceptor::refusing();
        let endpoint = AcceptorEndpoint::new("http-acceptor", acceptor.clone());
        endpoint.set_started(true);
        root.add_acceptor(endpoint);
        root.set_active(true);
        let registration =
            Arc::new(UpgradeRegistration::new(&UpgradeProfile::primary(), root, "http-acceptor").unwrap());
        let coordinator = HandoffCoordinator::new(registration.clone());
        let (mut client, server) = tokio::io::duplex(64);

        let outcome = coordinator.on_upgraded(ticket(&registration, &[]), server);

        assert!(matches!(outcome, HandoffOutcome::Closed(CloseReason::TransferFailed(_))));
        assert!(acceptor.resumed().is_empty());
        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn foreign_ticket_is_refused() {
        let f = fixture();
        let coordinator = HandoffCoordinator::new(f.registration.clone());
        let legacy = UpgradeRegistration::new(&UpgradeProfile::legacy(), f.root.clone(), "http-acceptor").unwrap();
        let (_client, server) = tokio::io::duplex(64);

        let outcome = coordinator.on_upgraded(ticket(&legacy, &[]), server);

        assert_eq!(outcome, HandoffOutcome::Closed(CloseReason::ForeignTicket));
        assert_eq!(f.acceptor.transfers(), 0);
    }
}
