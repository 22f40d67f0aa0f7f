//! Shared registries the bridge installs itself into.
//!
//! # Data Flow
//! ```text
//! BridgeService::start
//!     → dispatch.rs (protocol token → UpgradeHandler list)
//!     → metadata.rs (listener → advertised protocols)
//!
//! Per request:
//!     Upgrade header → UpgradeDispatchTable::dispatch → Accepted | Rejected
//! ```

pub mod dispatch;
pub mod metadata;

pub use dispatch::{Dispatch, UpgradeDispatchTable, UpgradeHandler, UpgradeRegistry};
pub use metadata::{ListenerMetadataRegistry, ListenerRegistry, ListenerUpgrade, UpgradeMetadata};
