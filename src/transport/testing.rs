//! In-memory acceptor for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::transport::acceptor::{ConnectionAcceptor, TransferError};
use crate::transport::channel::{ByteChannel, ConnectionId};

/// Records every transfer and resume; optionally refuses transfers.
#[derive(Debug, Default)]
pub struct RecordingAcceptor {
    transfers: AtomicUsize,
    refuse: AtomicBool,
    held: Mutex<Vec<ByteChannel>>,
    resumed: Mutex<Vec<ConnectionId>>,
}

impl RecordingAcceptor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        let acceptor = Self::default();
        acceptor.refuse.store(true, Ordering::SeqCst);
        Arc::new(acceptor)
    }

    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    pub fn resumed(&self) -> Vec<ConnectionId> {
        self.resumed.lock().unwrap().clone()
    }
}

impl ConnectionAcceptor for RecordingAcceptor {
    fn transfer_connection(&self, channel: ByteChannel) -> Result<(), TransferError> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransferError::Rejected("refusing".into()));
        }
        self.held.lock().unwrap().push(channel);
        Ok(())
    }

    fn resume_reads(&self, id: ConnectionId) {
        self.resumed.lock().unwrap().push(id);
    }
}
