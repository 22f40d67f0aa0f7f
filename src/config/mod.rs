//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! bridge.toml
//!     → loader.rs (read, deserialize into BridgeConfig)
//!     → validation.rs (addresses, magic, header names, references)
//!     → lifecycle::startup builds topology and bridges from it
//!
//! With --watch:
//!     watcher.rs sees the file change
//!     → loader.rs reloads and revalidates
//!     → BrokerDirectory::apply_status updates active/started flags
//! ```
//!
//! # Design Decisions
//! - Topology shape (brokers, acceptors, bridges) is fixed until restart
//! - Every field has a default, so a config only needs brokers and bridges
//! - serde rejects malformed input; validation.rs rejects inconsistent input

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AcceptorConfig, AdminConfig, BridgeConfig, BridgeEntry, BrokerConfig, ListenerConfig, ObservabilityConfig,
    ProtocolsConfig,
};
