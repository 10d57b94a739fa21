use super::NameService;
use crate::orb::{
    Args, FaultKind, MethodRegistry, PeerAddress, PeerId, RegistryError, RemoteFault, RpcError,
    reply,
};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Registration {
    peer_type: String,
    address: PeerAddress,
    hash: String,
}

#[derive(Debug)]
struct DirectoryState {
    next_id: u32,
    entries: BTreeMap<PeerId, Registration>,
}

/// In-memory name service.
///
/// Ids are handed out in increasing order starting at 1 and are never
/// reused, whatever the type.
pub struct LocalDirectory {
    state: Mutex<DirectoryState>,
}

impl LocalDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                next_id: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Registers under a caller-chosen id. Later automatic ids continue
    /// above the highest id seen.
    pub async fn register_with_id(
        &self,
        id: PeerId,
        peer_type: &str,
        address: &PeerAddress,
    ) -> Result<String, RpcError> {
        let mut state = self.state.lock().await;

        if state.entries.contains_key(&id) {
            return Err(RemoteFault::message(
                FaultKind::InvalidArguments,
                format!("id {} is already registered", id),
            )
            .into());
        }

        let hash = new_hash();
        state.entries.insert(
            id,
            Registration {
                peer_type: peer_type.to_string(),
                address: address.clone(),
                hash: hash.clone(),
            },
        );
        state.next_id = state.next_id.max(id.0 + 1);

        tracing::info!("Directory: {} '{}' at {}", id, peer_type, address);
        Ok(hash)
    }

    /// Number of registered peers, all types together.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Exposes the directory through `registry` so remote peers can reach it
    /// with a [`super::RemoteDirectory`].
    pub fn register_methods(self: &Arc<Self>, registry: &MethodRegistry) -> Result<(), RegistryError> {
        let dir = self.clone();
        registry.register("register", move |args: Args| {
            let dir = dir.clone();
            async move {
                let peer_type: String = args.get(0, "type")?;
                let address: PeerAddress = args.get(1, "address")?;
                let (id, hash) = dir.register(&peer_type, &address).await?;
                reply((id, hash))
            }
        })?;

        let dir = self.clone();
        registry.register("unregister", move |args: Args| {
            let dir = dir.clone();
            async move {
                let id: PeerId = args.get(0, "id")?;
                let peer_type: String = args.get(1, "type")?;
                let hash: String = args.get(2, "hash")?;
                dir.unregister(id, &peer_type, &hash).await?;
                reply(())
            }
        })?;

        let dir = self.clone();
        registry.register("require_any", move |args: Args| {
            let dir = dir.clone();
            async move {
                let peer_type: String = args.get(0, "type")?;
                reply(dir.require_any(&peer_type).await?)
            }
        })?;

        let dir = self.clone();
        registry.register("require_object", move |args: Args| {
            let dir = dir.clone();
            async move {
                let peer_type: String = args.get(0, "type")?;
                let id: PeerId = args.get(1, "id")?;
                reply(dir.require_object(&peer_type, id).await?)
            }
        })?;

        let dir = self.clone();
        registry.register("require_all", move |args: Args| {
            let dir = dir.clone();
            async move {
                let peer_type: String = args.get(0, "type")?;
                reply(dir.require_all(&peer_type).await?)
            }
        })?;

        Ok(())
    }
}

impl Default for LocalDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn new_hash() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn not_registered(args: Vec<serde_json::Value>) -> RpcError {
    RemoteFault::new(FaultKind::NotRegistered, args).into()
}

#[async_trait]
impl NameService for LocalDirectory {
    async fn register(
        &self,
        peer_type: &str,
        address: &PeerAddress,
    ) -> Result<(PeerId, String), RpcError> {
        let mut state = self.state.lock().await;

        let id = PeerId(state.next_id);
        state.next_id += 1;

        let hash = new_hash();
        state.entries.insert(
            id,
            Registration {
                peer_type: peer_type.to_string(),
                address: address.clone(),
                hash: hash.clone(),
            },
        );

        tracing::info!("Directory: {} '{}' at {}", id, peer_type, address);
        Ok((id, hash))
    }

    async fn unregister(&self, id: PeerId, peer_type: &str, hash: &str) -> Result<(), RpcError> {
        let mut state = self.state.lock().await;

        let entry = state
            .entries
            .get(&id)
            .filter(|entry| entry.peer_type == peer_type)
            .ok_or_else(|| not_registered(vec![json!(peer_type), json!(id)]))?;

        if entry.hash != hash {
            return Err(RemoteFault::new(FaultKind::InvalidHash, vec![json!(id)]).into());
        }

        state.entries.remove(&id);
        tracing::info!("Directory: {} '{}' left", id, peer_type);
        Ok(())
    }

    async fn require_any(&self, peer_type: &str) -> Result<PeerAddress, RpcError> {
        let state = self.state.lock().await;

        let candidates: Vec<&Registration> = state
            .entries
            .values()
            .filter(|entry| entry.peer_type == peer_type)
            .collect();

        candidates
            .choose(&mut rand::thread_rng())
            .map(|entry| entry.address.clone())
            .ok_or_else(|| not_registered(vec![json!(peer_type)]))
    }

    async fn require_object(&self, peer_type: &str, id: PeerId) -> Result<PeerAddress, RpcError> {
        let state = self.state.lock().await;

        state
            .entries
            .get(&id)
            .filter(|entry| entry.peer_type == peer_type)
            .map(|entry| entry.address.clone())
            .ok_or_else(|| not_registered(vec![json!(peer_type), json!(id)]))
    }

    async fn require_all(&self, peer_type: &str) -> Result<Vec<(PeerId, PeerAddress)>, RpcError> {
        let state = self.state.lock().await;

        Ok(state
            .entries
            .iter()
            .filter(|(_, entry)| entry.peer_type == peer_type)
            .map(|(id, entry)| (*id, entry.address.clone()))
            .collect())
    }
}
