//! Acceptor that pipes transferred connections to a broker's TCP acceptor.
//!
//! # Data Flow
//! ```text
//! transfer_connection(channel)  → parked (no reads yet)
//! resume_reads(id)              → connect to broker, copy bytes both ways
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::net::TcpStream;

use crate::transport::acceptor::{ConnectionAcceptor, TransferError};
use crate::transport::channel::{ByteChannel, ConnectionId};

/// Forwards tunnelled bytes to a broker acceptor listening on TCP.
#[derive(Debug)]
pub struct TcpForwardAcceptor {
    name: String,
    target: SocketAddr,
    /// Upgraded I/O is `Send` but not `Sync`; the mutex makes the map shareable.
    parked: DashMap<ConnectionId, Mutex<ByteChannel>>,
    closed: AtomicBool,
}

impl TcpForwardAcceptor {
    pub fn new(name: impl Into<String>, target: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            target,
            parked: DashMap::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Connections transferred but not yet resumed.
    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Refuse further transfers and drop any parked connections.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.parked.clear();
    }
}

impl ConnectionAcceptor for TcpForwardAcceptor {
    fn transfer_connection(&self, channel: ByteChannel) -> Result<(), TransferError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransferError::Closed);
        }
        tracing::debug!(
            acceptor = %self.name,
            connection_id = %channel.id(),
            "Connection transferred"
        );
        self.parked.insert(channel.id(), Mutex::new(channel));
        Ok(())
    }

    fn resume_reads(&self, id: ConnectionId) {
        let Some((_, parked)) = self.parked.remove(&id) else {
            tracing::debug!(acceptor = %self.name, connection_id = %id, "Resume for unknown connection");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(acceptor = %self.name, connection_id = %id, "No runtime to forward on, closing");
            return;
        };

        let mut channel = parked.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        let target = self.target;
        let name = self.name.clone();

        runtime.spawn(async move {
            match TcpStream::connect(target).await {
                Ok(mut upstream) => {
                    match tokio::io::copy_bidirectional(&mut channel, &mut upstream).await {
                        Ok((to_broker, to_client)) => {
                            tracing::debug!(
                                acceptor = %name,
                                connection_id = %id,
                                to_broker,
                                to_client,
                                "Tunnel finished"
                            );
                        }
                        Err(e) => {
                            tracing::debug!(acceptor = %name, connection_id = %id, error = %e, "Tunnel aborted");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        acceptor = %name,
                        connection_id = %id,
                        target = %target,
                        error = %e,
                        "Failed to reach broker acceptor"
                    );
                }
            }
        });
    }
}
