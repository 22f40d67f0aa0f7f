//! Hand-off of upgraded connections to broker acceptors.

pub mod coordinator;

pub use coordinator::{CloseReason, HandoffCoordinator, HandoffOutcome, HandoffTicket};
