//! Handshake validation.
//!
//! # State Machine
//! ```text
//! AwaitingHeaders → KeyMissing        (protocol violation, logged at warn)
//!                 → TargetUnresolved  (not this bridge's request, silent)
//!                 → TargetInactive    (standby instance or stopped transport)
//!                 → Accepted          (accept token computed)
//! ```
//! Every reject state looks the same to the client: the connection is not
//! upgraded.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::directory::selector::{Mismatch, TargetSelector};
use crate::handshake::registration::UpgradeRegistration;
use crate::observability::metrics;

/// Request state for one upgrade attempt.
#[derive(Debug, Clone)]
pub struct HandshakeContext {
    headers: HeaderMap,
}

impl HandshakeContext {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Why a handshake was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Client key header absent or not visible ASCII.
    KeyMissing,
    /// Headers select a broker or acceptor this bridge does not serve.
    TargetUnresolved(Mismatch),
    /// Target exists but is not serving.
    TargetInactive { broker: String, acceptor: String },
}

impl Rejection {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::KeyMissing => "key_missing",
            Rejection::TargetUnresolved(_) => "target_unresolved",
            Rejection::TargetInactive { .. } => "target_inactive",
        }
    }
}

/// A successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    /// Value for the registration's accept header.
    pub accept_token: String,
    pub broker: String,
    pub acceptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Accepted(Acceptance),
    Rejected(Rejection),
}

impl HandshakeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, HandshakeOutcome::Accepted(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            HandshakeOutcome::Accepted(_) => "accepted",
            HandshakeOutcome::Rejected(r) => r.label(),
        }
    }
}

/// Decides accept/reject for upgrade requests of one registration.
#[derive(Debug, Clone)]
pub struct HandshakeValidator {
    registration: Arc<UpgradeRegistration>,
}

impl HandshakeValidator {
    pub fn new(registration: Arc<UpgradeRegistration>) -> Self {
        Self { registration }
    }

    pub fn registration(&self) -> &Arc<UpgradeRegistration> {
        &self.registration
    }

    pub fn handle(&self, context: &HandshakeContext) -> HandshakeOutcome {
        let outcome = self.evaluate(context);
        self.record(&outcome);
        outcome
    }

    /// Log and count a final decision.
    pub(crate) fn record(&self, outcome: &HandshakeOutcome) {
        if let HandshakeOutcome::Rejected(Rejection::KeyMissing) = outcome {
            tracing::warn!(
                protocol = %self.registration.protocol(),
                header = %self.registration.key_header(),
                "Upgrade request without client key"
            );
        }
        metrics::record_handshake(self.registration.protocol(), outcome.label());
    }

    /// Decide without recording; callers offering a request to several
    /// validators record only the decision that stands.
    pub(crate) fn evaluate(&self, context: &HandshakeContext) -> HandshakeOutcome {
        let registration = &*self.registration;
        let headers = context.headers();

        let Some(key) = headers
            .get(registration.key_header())
            .and_then(|v| v.to_str().ok())
        else {
            return HandshakeOutcome::Rejected(Rejection::KeyMissing);
        };

        let target = match TargetSelector::new(registration).resolve(headers) {
            Ok(target) => target,
            Err(mismatch) => {
                tracing::trace!(
                    protocol = %registration.protocol(),
                    endpoint = %registration.endpoint(),
                    mismatch = ?mismatch,
                    "Upgrade request belongs to another bridge"
                );
                return HandshakeOutcome::Rejected(Rejection::TargetUnresolved(mismatch));
            }
        };

        if !target.is_available() {
            tracing::debug!(
                protocol = %registration.protocol(),
                broker = %target.broker.name(),
                acceptor = %target.acceptor.name(),
                broker_active = target.broker.is_active(),
                transport_started = target.acceptor.is_transport_started(),
                "Upgrade target is not serving"
            );
            return HandshakeOutcome::Rejected(Rejection::TargetInactive {
                broker: target.broker.name().to_string(),
                acceptor: target.acceptor.name().to_string(),
            });
        }

        HandshakeOutcome::Accepted(Acceptance {
            accept_token: registration.digest().accept_token(key),
            broker: target.broker.name().to_string(),
            acceptor: target.acceptor.name().to_string(),
        })
    }
}
