//! HTTP upgrade bridge for broker acceptors.
//!
//! Clients open a plain HTTP/1.1 connection, ask to switch to a registered
//! messaging protocol, prove it with a keyed digest, and after the 101 the
//! raw connection is handed to the broker acceptor named in the request.

// Handshake and hand-off core
pub mod directory;
pub mod handoff;
pub mod handshake;
pub mod registry;
pub mod transport;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::schema::BridgeConfig;
pub use error::BridgeError;
pub use http::HttpServer;
pub use lifecycle::{BridgeRuntime, BridgeService, Shutdown};
pub use registry::{UpgradeDispatchTable, UpgradeRegistry};
pub use transport::{ByteChannel, ConnectionAcceptor, TransferError};
