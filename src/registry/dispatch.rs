//! Shared upgrade dispatch table.
//!
//! # Responsibilities
//! - Map upgrade protocol tokens to the handlers registered for them
//! - Reject duplicate (protocol, broker, endpoint) registrations
//! - Offer each inbound upgrade to the handlers for its token, in
//!   registration order, until one accepts
//!
//! # Design Decisions
//! - Reads are lock-free (`ArcSwap` snapshot); writes only happen on bridge
//!   start/stop and publish a new map
//! - Tokens compare case-insensitively
//! - A registration only ever removes its own entry

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{header, HeaderMap};

use crate::error::BridgeError;
use crate::handoff::{HandoffCoordinator, HandoffOutcome, HandoffTicket};
use crate::handshake::registration::{RegistrationKey, UpgradeRegistration};
use crate::handshake::validator::{Acceptance, HandshakeContext, HandshakeOutcome, HandshakeValidator, Rejection};
use crate::transport::RawConnection;

/// Validator and coordinator installed under one protocol token.
#[derive(Debug)]
pub struct UpgradeHandler {
    key: RegistrationKey,
    validator: HandshakeValidator,
    coordinator: HandoffCoordinator,
}

impl UpgradeHandler {
    pub fn new(registration: Arc<UpgradeRegistration>) -> Self {
        Self {
            key: registration.key(),
            validator: HandshakeValidator::new(Arc::clone(&registration)),
            coordinator: HandoffCoordinator::new(registration),
        }
    }

    pub fn key(&self) -> &RegistrationKey {
        &self.key
    }

    pub fn registration(&self) -> &Arc<UpgradeRegistration> {
        self.validator.registration()
    }

    /// Validate a handshake; on accept, issue the hand-off ticket.
    pub fn handshake(&self, context: HandshakeContext) -> Result<(Acceptance, HandoffTicket), Rejection> {
        match self.validator.handle(&context) {
            HandshakeOutcome::Accepted(acceptance) => {
                Ok((acceptance, HandoffTicket::new(self.key.clone(), context)))
            }
            HandshakeOutcome::Rejected(rejection) => Err(rejection),
        }
    }

    pub fn on_upgraded<R: RawConnection>(&self, ticket: HandoffTicket, raw: R) -> HandoffOutcome {
        self.coordinator.on_upgraded(ticket, raw)
    }
}

/// Registration surface of an HTTP listener's upgrade table.
pub trait UpgradeRegistry: Send + Sync {
    /// Install `handler` under its protocol token.
    fn register_protocol(&self, handler: Arc<UpgradeHandler>) -> Result<(), BridgeError>;

    /// Remove the handler registered under `key`. Returns whether it was present.
    fn deregister_protocol(&self, key: &RegistrationKey) -> bool;
}

/// Result of routing one request through the table.
#[derive(Debug)]
pub enum Dispatch {
    /// Request carries no `Upgrade` header.
    NotUpgrade,
    /// No handler is registered for the requested token(s).
    UnknownProtocol(String),
    /// Every handler for the token rejected; carries the last rejection.
    Rejected { protocol: String, rejection: Rejection },
    Accepted {
        handler: Arc<UpgradeHandler>,
        acceptance: Acceptance,
        ticket: HandoffTicket,
    },
}

type ProtocolMap = HashMap<String, Vec<Arc<UpgradeHandler>>>;

/// In-memory upgrade table for one HTTP listener.
#[derive(Debug, Default)]
pub struct UpgradeDispatchTable {
    protocols: ArcSwap<ProtocolMap>,
}

impl UpgradeDispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers registered for `protocol`, in registration order.
    pub fn handlers(&self, protocol: &str) -> Vec<Arc<UpgradeHandler>> {
        self.protocols
            .load()
            .get(&protocol.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Registered protocol tokens, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.protocols.load().keys().cloned().collect();
        protocols.sort();
        protocols
    }

    /// Total number of installed handlers.
    pub fn len(&self) -> usize {
        self.protocols.load().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a request by its `Upgrade` header.
    ///
    /// A comma-separated `Upgrade` list is tried left to right; the first
    /// token with registered handlers is used.
    pub fn dispatch(&self, headers: &HeaderMap) -> Dispatch {
        let Some(requested) = headers.get(header::UPGRADE).and_then(|v| v.to_str().ok()) else {
            return Dispatch::NotUpgrade;
        };

        let snapshot = self.protocols.load();
        let found = requested
            .split(',')
            .map(|token| token.trim().to_ascii_lowercase())
            .find_map(|token| snapshot.get(&token).map(|handlers| (token, handlers.clone())));
        let Some((protocol, handlers)) = found else {
            tracing::debug!(upgrade = %requested, "No handler for upgrade protocol");
            return Dispatch::UnknownProtocol(requested.to_string());
        };

        // Only the decision that stands is logged and counted: the accepting
        // handler's, or the last rejection when nobody accepts.
        let mut last = None;
        for handler in handlers {
            let context = HandshakeContext::new(headers.clone());
            match handler.validator.evaluate(&context) {
                HandshakeOutcome::Accepted(acceptance) => {
                    handler.validator.record(&HandshakeOutcome::Accepted(acceptance.clone()));
                    let ticket = HandoffTicket::new(handler.key.clone(), context);
                    return Dispatch::Accepted {
                        handler,
                        acceptance,
                        ticket,
                    };
                }
                HandshakeOutcome::Rejected(rejection) => last = Some((handler, rejection)),
            }
        }

        let Some((handler, rejection)) = last else {
            return Dispatch::UnknownProtocol(requested.to_string());
        };
        handler.validator.record(&HandshakeOutcome::Rejected(rejection.clone()));
        Dispatch::Rejected { protocol, rejection }
    }
}

impl UpgradeRegistry for UpgradeDispatchTable {
    fn register_protocol(&self, handler: Arc<UpgradeHandler>) -> Result<(), BridgeError> {
        let key = handler.key().clone();
        let mut duplicate = false;
        self.protocols.rcu(|current| {
            let mut next = ProtocolMap::clone(current);
            let handlers = next.entry(key.protocol.clone()).or_default();
            duplicate = handlers.iter().any(|h| *h.key() == key);
            if !duplicate {
                handlers.push(Arc::clone(&handler));
            }
            next
        });
        if duplicate {
            return Err(BridgeError::DuplicateRegistration {
                protocol: key.protocol,
                broker: key.broker,
                endpoint: key.endpoint,
            });
        }
        Ok(())
    }

    fn deregister_protocol(&self, key: &RegistrationKey) -> bool {
        let mut removed = false;
        self.protocols.rcu(|current| {
            let mut next = ProtocolMap::clone(current);
            removed = false;
            if let Some(handlers) = next.get_mut(&key.protocol) {
                let before = handlers.len();
                handlers.retain(|h| h.key() != key);
                removed = handlers.len() != before;
                if handlers.is_empty() {
                    next.remove(&key.protocol);
                }
            }
            next
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::broker::{AcceptorEndpoint, BrokerInstance};
    use crate::handshake::profile::UpgradeProfile;
    use crate::observability::metrics::testing::CountingRecorder;
    use crate::transport::testing::RecordingAcceptor;
    use axum::http::{HeaderName, HeaderValue};

    fn serving_root(acceptors: &[&str]) -> Arc<BrokerInstance> {
        let root = BrokerInstance::new("default");
        for name in acceptors {
            let endpoint = AcceptorEndpoint::new(*name, RecordingAcceptor::new());
            endpoint.set_started(true);
            root.add_acceptor(endpoint);
        }
        root.set_active(true);
        root
    }

    fn handler(profile: &UpgradeProfile, root: &Arc<BrokerInstance>, endpoint: &str) -> Arc<UpgradeHandler> {
        let registration = UpgradeRegistration::new(profile, root.clone(), endpoint).unwrap();
        Arc::new(UpgradeHandler::new(Arc::new(registration)))
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn duplicate_registration_rejected_before_install() {
        let table = UpgradeDispatchTable::new();
        let root = serving_root(&["http-acceptor"]);

        table
            .register_protocol(handler(&UpgradeProfile::primary(), &root, "http-acceptor"))
            .unwrap();
        let err = table
            .register_protocol(handler(&UpgradeProfile::primary(), &root, "http-acceptor"))
            .unwrap_err();

        assert!(matches!(err, BridgeError::DuplicateRegistration { .. }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn deregister_removes_only_own_entry() {
        let table = UpgradeDispatchTable::new();
        let root = serving_root(&["a", "b"]);
        let a = handler(&UpgradeProfile::primary(), &root, "a");
        let b = handler(&UpgradeProfile::primary(), &root, "b");
        table.register_protocol(a.clone()).unwrap();
        table.register_protocol(b.clone()).unwrap();

        assert!(table.deregister_protocol(a.key()));
        assert!(!table.deregister_protocol(a.key()));
        assert_eq!(table.handlers("activemq-remoting").len(), 1);

        assert!(table.deregister_protocol(b.key()));
        assert!(table.is_empty());
        assert!(table.protocols().is_empty());
    }

    #[test]
    fn routes_by_token_without_cross_talk() {
        let table = UpgradeDispatchTable::new();
        let root = serving_root(&["http-acceptor"]);
        let mut primary = UpgradeProfile::primary();
        primary.protocol = "proto-a".into();
        let mut legacy = UpgradeProfile::legacy();
        legacy.protocol = "proto-b".into();
        table.register_protocol(handler(&primary, &root, "http-acceptor")).unwrap();
        table.register_protocol(handler(&legacy, &root, "http-acceptor")).unwrap();

        let a = table.dispatch(&headers(&[("upgrade", "proto-a"), ("Sec-ActiveMQRemoting-Key", "k")]));
        match a {
            Dispatch::Accepted { handler, .. } => assert_eq!(handler.key().protocol, "proto-a"),
            other => panic!("unexpected dispatch: {other:?}"),
        }

        let b = table.dispatch(&headers(&[("upgrade", "PROTO-B"), ("Sec-HornetQRemoting-Key", "k")]));
        match b {
            Dispatch::Accepted { handler, .. } => assert_eq!(handler.key().protocol, "proto-b"),
            other => panic!("unexpected dispatch: {other:?}"),
        }

        // A primary key header sent under the legacy token does not satisfy the legacy validator.
        let cross = table.dispatch(&headers(&[("upgrade", "proto-b"), ("Sec-ActiveMQRemoting-Key", "k")]));
        assert!(matches!(
            cross,
            Dispatch::Rejected { ref protocol, rejection: Rejection::KeyMissing } if protocol == "proto-b"
        ));
    }

    #[test]
    fn cooperating_bridges_claim_their_own_endpoint() {
        let table = UpgradeDispatchTable::new();
        let root = serving_root(&["a", "b"]);
        table.register_protocol(handler(&UpgradeProfile::primary(), &root, "a")).unwrap();
        table.register_protocol(handler(&UpgradeProfile::primary(), &root, "b")).unwrap();

        let dispatch = table.dispatch(&headers(&[
            ("upgrade", "activemq-remoting"),
            ("Sec-ActiveMQRemoting-Key", "k"),
            ("httpUpgradeEndpoint", "b"),
        ]));
        match dispatch {
            Dispatch::Accepted { handler, acceptance, .. } => {
                assert_eq!(handler.key().endpoint, "b");
                assert_eq!(acceptance.acceptor, "b");
            }
            other => panic!("unexpected dispatch: {other:?}"),
        }
    }

    #[test]
    fn cooperating_bridges_count_one_decision_per_request() {
        let table = UpgradeDispatchTable::new();
        let root = serving_root(&["a", "b"]);
        table.register_protocol(handler(&UpgradeProfile::primary(), &root, "a")).unwrap();
        table.register_protocol(handler(&UpgradeProfile::primary(), &root, "b")).unwrap();
        let recorder = CountingRecorder::default();

        let (keyless, claimed) = metrics::with_local_recorder(&recorder, || {
            let keyless = table.dispatch(&headers(&[("upgrade", "activemq-remoting")]));
            let claimed = table.dispatch(&headers(&[
                ("upgrade", "activemq-remoting"),
                ("Sec-ActiveMQRemoting-Key", "k"),
                ("httpUpgradeEndpoint", "b"),
            ]));
            (keyless, claimed)
        });

        assert!(matches!(keyless, Dispatch::Rejected { rejection: Rejection::KeyMissing, .. }));
        assert!(matches!(claimed, Dispatch::Accepted { .. }));
        let count = |outcome: &str| {
            recorder.count(&format!("bridge_handshakes_total{{protocol=activemq-remoting,outcome={outcome}}}"))
        };
        assert_eq!(count("key_missing"), 1);
        assert_eq!(count("accepted"), 1);
        assert_eq!(count("target_unresolved"), 0);
        assert_eq!(recorder.total("bridge_handshakes_total"), 2);
    }

    #[test]
    fn non_upgrade_and_unknown_tokens() {
        let table = UpgradeDispatchTable::new();
        assert!(matches!(table.dispatch(&HeaderMap::new()), Dispatch::NotUpgrade));
        assert!(matches!(
            table.dispatch(&headers(&[("upgrade", "websocket")])),
            Dispatch::UnknownProtocol(ref p) if p == "websocket"
        ));
    }

    #[test]
    fn upgrade_list_picks_first_registered_token() {
        let table = UpgradeDispatchTable::new();
        let root = serving_root(&["http-acceptor"]);
        table
            .register_protocol(handler(&UpgradeProfile::legacy(), &root, "http-acceptor"))
            .unwrap();

        let dispatch = table.dispatch(&headers(&[
            ("upgrade", "websocket, hornetq-remoting"),
            ("Sec-HornetQRemoting-Key", "k"),
        ]));
        assert!(matches!(dispatch, Dispatch::Accepted { .. }));
    }
}
