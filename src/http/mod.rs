//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, upgrade-aware hyper connection)
//!     → registry::UpgradeDispatchTable (token lookup, handshake)
//!     → 101 Switching Protocols, or 404 with empty body
//!     → hyper upgrade future → UpgradeHandler::on_upgraded
//! ```

pub mod server;

pub use server::HttpServer;
