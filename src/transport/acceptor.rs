//! The broker-side seam for transferred connections.

use std::fmt;

use thiserror::Error;

use crate::transport::channel::{ByteChannel, ConnectionId};

/// Errors an acceptor may report when refusing a transferred connection.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Acceptor has been shut down.
    #[error("Acceptor is closed")]
    Closed,

    /// Acceptor refused the connection.
    #[error("Transfer rejected: {0}")]
    Rejected(String),

    #[error("Transfer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A broker acceptor able to adopt an already-established connection.
///
/// Implementations must not block: both calls run on the I/O task that
/// completed the HTTP upgrade.
pub trait ConnectionAcceptor: Send + Sync + fmt::Debug {
    /// Take ownership of `channel`.
    ///
    /// On error the channel has already been dropped, which closes it.
    fn transfer_connection(&self, channel: ByteChannel) -> Result<(), TransferError>;

    /// Begin delivering read readiness for a previously transferred
    /// connection, letting the acceptor's own event loop take over.
    fn resume_reads(&self, id: ConnectionId);
}
