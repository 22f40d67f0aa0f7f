//! Transport seam between the bridge and broker acceptors.
//!
//! # Data Flow
//! ```text
//! hyper upgraded I/O
//!     → channel.rs (ByteChannel: owned, type-erased, tagged with ConnectionId)
//!     → acceptor.rs (ConnectionAcceptor::transfer_connection, resume_reads)
//!     → forward.rs (TCP forwarding to the broker's native acceptor)
//! ```

pub mod acceptor;
pub mod channel;
pub mod forward;

#[cfg(test)]
pub(crate) mod testing;

pub use acceptor::{ConnectionAcceptor, TransferError};
pub use channel::{ByteChannel, ConnectionId, RawConnection};
pub use forward::TcpForwardAcceptor;
