//! Upgrade handshake subsystem.
//!
//! # Data Flow
//! ```text
//! UpgradeProfile (primary | legacy strings)
//!     → registration.rs (parsed headers, validated magic, target binding)
//!     → validator.rs (key check → target selection → liveness → accept token)
//!     → digest.rs (base64(SHA-1(key ‖ magic)))
//! ```

pub mod digest;
pub mod profile;
pub mod registration;
pub mod validator;

pub use digest::{compute_accept_token, DigestEngine};
pub use profile::UpgradeProfile;
pub use registration::{RegistrationKey, UpgradeRegistration};
pub use validator::{Acceptance, HandshakeContext, HandshakeOutcome, HandshakeValidator, Rejection};
