//! Cluster state shared by membership and the token lock.

use super::types::MembershipError;
use crate::lock::types::LockBook;
use crate::orb::{PeerAddress, PeerId, Stub};

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Notify};

/// Everything guarded by the cluster mutex.
#[derive(Debug, Default)]
pub struct ClusterView {
    pub peers: BTreeMap<PeerId, Stub>,
    pub lock: LockBook,
}

impl ClusterView {
    /// Member ids in ring order.
    pub fn ring(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Proxies for every member except `owner`.
    pub fn others(&self, owner: PeerId) -> Vec<(PeerId, Stub)> {
        self.peers
            .iter()
            .filter(|(pid, _)| **pid != owner)
            .map(|(pid, stub)| (*pid, stub.clone()))
            .collect()
    }

    pub fn insert_peer(&mut self, pid: PeerId, address: PeerAddress) {
        self.peers.insert(pid, Stub::new(address));
    }

    pub fn remove_peer(&mut self, pid: PeerId) -> Result<Stub, MembershipError> {
        self.peers
            .remove(&pid)
            .ok_or(MembershipError::PeerNotFound(pid))
    }
}

pub struct ClusterState {
    view: Mutex<ClusterView>,
    token_arrived: Notify,
}

impl ClusterState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            view: Mutex::new(ClusterView::default()),
            token_arrived: Notify::new(),
        })
    }

    pub async fn lock(&self) -> MutexGuard<'_, ClusterView> {
        self.view.lock().await
    }

    /// Signalled whenever a token is handed to this peer.
    pub fn token_arrived(&self) -> &Notify {
        &self.token_arrived
    }

    /// A peer joined: add it to the membership map and to the lock
    /// bookkeeping in one step.
    pub async fn join(&self, pid: PeerId, address: PeerAddress) {
        let mut view = self.view.lock().await;
        view.insert_peer(pid, address);
        view.lock.admit(pid);
        tracing::info!("Peer {} has joined the system", pid);
    }

    /// A peer left: drop it from membership and the lock bookkeeping.
    pub async fn leave(&self, pid: PeerId) -> Result<(), MembershipError> {
        let mut view = self.view.lock().await;
        view.remove_peer(pid)?;
        view.lock.evict(pid);
        tracing::info!("Peer {} has left the system", pid);
        Ok(())
    }
}
