//! Bridge start-up and registration errors.
//!
//! Per-request failures never surface here: they resolve to a rejected
//! handshake or a closed connection. These errors only come out of
//! `start()` and the configuration-driven assembly in `lifecycle::startup`.

use thiserror::Error;

/// Fatal configuration or environment errors for a bridge instance.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Handshake magic is not a 36-byte ASCII constant.
    #[error("Protocol magic for '{protocol}' must be 36 ASCII bytes, got {len}")]
    InvalidMagic { protocol: String, len: usize },

    /// A configured header name is not a legal HTTP header name.
    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),

    /// Upgrade protocol token is empty.
    #[error("Upgrade protocol token must not be empty")]
    EmptyProtocol,

    /// The same (protocol, broker, endpoint) identity is already installed.
    #[error("Upgrade protocol '{protocol}' is already registered for broker '{broker}' endpoint '{endpoint}'")]
    DuplicateRegistration {
        protocol: String,
        broker: String,
        endpoint: String,
    },

    /// An acceptor's forward address does not parse.
    #[error("Invalid forward address '{address}' for acceptor '{acceptor}'")]
    InvalidForwardAddress { acceptor: String, address: String },

    /// A bridge references a broker instance that does not exist.
    #[error("Unknown broker instance '{0}'")]
    UnknownBroker(String),

    /// A bridge references an acceptor the broker does not own.
    #[error("Broker '{broker}' has no acceptor named '{acceptor}'")]
    UnknownAcceptor { broker: String, acceptor: String },
}
