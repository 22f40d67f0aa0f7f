//! Broker instances and their acceptor endpoints.
//!
//! # Design Decisions
//! - Topology maps live behind `ArcSwap`: readers take a snapshot without
//!   locking, writers publish a whole new map (no torn reads)
//! - Activity flags are plain atomics, read on every handshake
//! - The bridge only reads this state; mutation belongs to whoever owns the
//!   broker lifecycle (startup, config reload, tests)

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::transport::ConnectionAcceptor;

/// A named network acceptor owned by one broker instance.
pub struct AcceptorEndpoint {
    name: String,
    started: AtomicBool,
    acceptor: Arc<dyn ConnectionAcceptor>,
}

impl AcceptorEndpoint {
    /// Create an acceptor endpoint. The transport starts out stopped.
    pub fn new(name: impl Into<String>, acceptor: Arc<dyn ConnectionAcceptor>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            started: AtomicBool::new(false),
            acceptor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the acceptor's transport is currently started.
    pub fn is_transport_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    /// The transport that receives transferred connections.
    pub fn acceptor(&self) -> &Arc<dyn ConnectionAcceptor> {
        &self.acceptor
    }
}

impl fmt::Debug for AcceptorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceptorEndpoint")
            .field("name", &self.name)
            .field("started", &self.is_transport_started())
            .field("acceptor", &self.acceptor)
            .finish()
    }
}

/// A broker instance: the unnamed primary, a named root, or an HA backup.
#[derive(Debug)]
pub struct BrokerInstance {
    name: String,
    active: AtomicBool,
    acceptors: ArcSwap<HashMap<String, Arc<AcceptorEndpoint>>>,
    backups: ArcSwap<HashMap<String, Arc<BrokerInstance>>>,
}

impl BrokerInstance {
    /// Create an inactive instance with no acceptors or backups.
    ///
    /// An empty name denotes the primary/unnamed instance.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            active: AtomicBool::new(false),
            acceptors: ArcSwap::from_pointee(HashMap::new()),
            backups: ArcSwap::from_pointee(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True only when fully started and, in HA setups, the serving member.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn acceptor(&self, name: &str) -> Option<Arc<AcceptorEndpoint>> {
        self.acceptors.load().get(name).cloned()
    }

    /// Snapshot of all acceptors.
    pub fn acceptors(&self) -> Arc<HashMap<String, Arc<AcceptorEndpoint>>> {
        self.acceptors.load_full()
    }

    pub fn add_acceptor(&self, endpoint: Arc<AcceptorEndpoint>) {
        self.acceptors.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(endpoint.name().to_string(), Arc::clone(&endpoint));
            next
        });
    }

    pub fn remove_acceptor(&self, name: &str) -> Option<Arc<AcceptorEndpoint>> {
        let mut removed = None;
        self.acceptors.rcu(|current| {
            let mut next = HashMap::clone(current);
            removed = next.remove(name);
            next
        });
        removed
    }

    /// Look up a backup reachable through this instance.
    pub fn resolve_backup(&self, name: &str) -> Option<Arc<BrokerInstance>> {
        self.backups.load().get(name).cloned()
    }

    /// Snapshot of all backups.
    pub fn backups(&self) -> Arc<HashMap<String, Arc<BrokerInstance>>> {
        self.backups.load_full()
    }

    pub fn add_backup(&self, backup: Arc<BrokerInstance>) {
        self.backups.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(backup.name().to_string(), Arc::clone(&backup));
            next
        });
    }

    pub fn remove_backup(&self, name: &str) -> Option<Arc<BrokerInstance>> {
        let mut removed = None;
        self.backups.rcu(|current| {
            let mut next = HashMap::clone(current);
            removed = next.remove(name);
            next
        });
        removed
    }

    /// Serializable view of this instance and its backups.
    pub fn status(&self) -> BrokerStatus {
        let mut acceptors: Vec<AcceptorStatus> = self
            .acceptors()
            .values()
            .map(|a| AcceptorStatus {
                name: a.name().to_string(),
                started: a.is_transport_started(),
            })
            .collect();
        acceptors.sort_by(|a, b| a.name.cmp(&b.name));

        let mut backups: Vec<BrokerStatus> = self.backups().values().map(|b| b.status()).collect();
        backups.sort_by(|a, b| a.name.cmp(&b.name));

        BrokerStatus {
            name: self.name.clone(),
            active: self.is_active(),
            acceptors,
            backups,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AcceptorStatus {
    pub name: String,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BrokerStatus {
    pub name: String,
    pub active: bool,
    pub acceptors: Vec<AcceptorStatus>,
    pub backups: Vec<BrokerStatus>,
}
