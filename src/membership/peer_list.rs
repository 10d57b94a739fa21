use super::remote::MembershipStub;
use super::state::ClusterState;
use super::types::{MembershipError, PeerEntry};
use crate::directory::NameService;
use crate::orb::{Peer, PeerAddress, PeerId, PeerIdentity, RpcError, Stub};

use std::fmt::Write;
use std::sync::Arc;

/// The local view of every peer sharing this peer's type.
pub struct PeerList {
    owner: PeerIdentity,
    name_service: Arc<dyn NameService>,
    state: Arc<ClusterState>,
}

impl PeerList {
    /// Empty list owned by `peer`. Call [`PeerList::initialize`] once the
    /// peer is serving.
    pub fn new(peer: &Peer) -> Self {
        Self {
            owner: peer.identity().clone(),
            name_service: peer.name_service(),
            state: ClusterState::new(),
        }
    }

    /// Shared with the distributed lock so both mutate under one mutex.
    pub fn state(&self) -> Arc<ClusterState> {
        self.state.clone()
    }

    pub fn owner(&self) -> &PeerIdentity {
        &self.owner
    }

    /// Fills the map from the directory and announces this peer to every
    /// peer with a lower id.
    ///
    /// Only lower ids are contacted: higher ids will announce themselves
    /// when they start, so each pair introduces itself exactly once.
    pub async fn initialize(&self) -> Result<(), RpcError> {
        let discovered = self.name_service.require_all(&self.owner.peer_type).await?;

        let lower: Vec<(PeerId, Stub)> = {
            let mut view = self.state.lock().await;
            view.insert_peer(self.owner.id, self.owner.address.clone());

            discovered
                .into_iter()
                .filter(|(pid, _)| *pid < self.owner.id)
                .map(|(pid, address)| {
                    view.insert_peer(pid, address.clone());
                    (pid, Stub::new(address))
                })
                .collect()
        };

        for (pid, stub) in lower {
            if let Err(e) = stub.register_peer(self.owner.id, &self.owner.address).await {
                tracing::warn!("Could not announce ourselves to peer {}: {}", pid, e);
            }
        }

        tracing::info!(
            "Peer list of '{}' initialized with {} peer(s)",
            self.owner.peer_type,
            self.state.lock().await.peers.len()
        );
        Ok(())
    }

    /// Tells every other peer of this type that we are leaving.
    pub async fn destroy(&self) -> Result<(), RpcError> {
        let registered = self.name_service.require_all(&self.owner.peer_type).await?;

        for (pid, address) in registered {
            if pid == self.owner.id {
                continue;
            }

            if let Err(e) = Stub::new(address).unregister_peer(self.owner.id).await {
                tracing::warn!("Could not say goodbye to peer {}: {}", pid, e);
            }
        }

        Ok(())
    }

    /// Adds a peer that announced itself.
    ///
    /// # Arguments
    /// * `pid` - The newcomer's directory id.
    /// * `address` - Where the newcomer listens.
    pub async fn register_peer(&self, pid: PeerId, address: PeerAddress) {
        self.state.lock().await.insert_peer(pid, address);
        tracing::info!("Peer {} has joined the system", pid);
    }

    /// Removes a peer that said goodbye.
    ///
    /// # Returns
    /// `PeerNotFound` if `pid` is not in the list.
    pub async fn unregister_peer(&self, pid: PeerId) -> Result<(), MembershipError> {
        self.state.lock().await.remove_peer(pid)?;
        tracing::info!("Peer {} has left the system", pid);
        Ok(())
    }

    /// Proxy for one member, for calling it directly.
    pub async fn peer(&self, pid: PeerId) -> Result<Stub, MembershipError> {
        self.state
            .lock()
            .await
            .peers
            .get(&pid)
            .cloned()
            .ok_or(MembershipError::PeerNotFound(pid))
    }

    /// Snapshot of the members, self included, in id order.
    pub async fn get_peers(&self) -> Vec<PeerEntry> {
        self.state
            .lock()
            .await
            .peers
            .iter()
            .map(|(pid, stub)| PeerEntry {
                id: *pid,
                address: stub.address().clone(),
            })
            .collect()
    }

    pub async fn display_peers(&self) -> String {
        let mut out = format!("List of peers of type '{}':", self.owner.peer_type);
        for entry in self.get_peers().await {
            let _ = write!(out, "\n    id: {:>2}, address: {}", entry.id.0, entry.address);
        }
        out
    }
}
