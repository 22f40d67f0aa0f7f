//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Broker topology → Dispatch table → BridgeService::start per entry
//!
//! Bridge (bridge.rs):
//!     start: register handler → publish listener metadata
//!     stop:  withdraw metadata → deregister handler
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → broadcast → servers drain → bridges stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup: topology first, then bridges, then listeners
//! - Ordered shutdown: stop accepting, then stop bridges newest first

pub mod bridge;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use bridge::BridgeService;
pub use shutdown::Shutdown;
pub use startup::BridgeRuntime;
