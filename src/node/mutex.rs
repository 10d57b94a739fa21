use crate::config::PeerConfig;
use crate::directory::NameService;
use crate::lock::{DistributedLock, LockError, LockStatus, Token};
use crate::membership::{MembershipError, PeerList};
use crate::orb::{Args, MethodRegistry, Peer, PeerAddress, PeerId, RegistryError, reply};

use anyhow::{Context, Result};
use std::sync::Arc;

/// A peer taking part in cluster-wide mutual exclusion.
pub struct MutexPeer {
    peer: Arc<Peer>,
    peer_list: Arc<PeerList>,
    lock: Arc<DistributedLock>,
}

impl MutexPeer {
    /// Registers with the directory and wires the components together.
    /// Nothing is served until [`MutexPeer::start`] or a wrapping role does.
    pub async fn build(config: &PeerConfig, name_service: Arc<dyn NameService>) -> Result<Self> {
        let peer = Peer::start(config, name_service).await?;
        let peer_list = Arc::new(PeerList::new(&peer));
        let lock = Arc::new(DistributedLock::new(&peer_list));

        Ok(Self {
            peer,
            peer_list,
            lock,
        })
    }

    pub async fn start(config: &PeerConfig, name_service: Arc<dyn NameService>) -> Result<Arc<Self>> {
        let node = Arc::new(Self::build(config, name_service).await?);

        let registry = MethodRegistry::new();
        node.register_methods(&registry)?;
        node.serve(registry).await?;

        Ok(node)
    }

    /// Starts listening, then joins the cluster: membership first, lock
    /// second.
    pub async fn serve(&self, registry: Arc<MethodRegistry>) -> Result<()> {
        self.peer.serve(registry).await?;
        self.peer_list
            .initialize()
            .await
            .context("Failed to initialize the peer list")?;
        self.lock.initialize().await;
        Ok(())
    }

    pub fn register_methods(self: &Arc<Self>, registry: &MethodRegistry) -> Result<(), RegistryError> {
        let node = self.clone();
        registry.register("check", move |_args: Args| {
            let node = node.clone();
            async move { reply(node.peer.check()) }
        })?;

        let node = self.clone();
        registry.register("display_peers", move |_args: Args| {
            let node = node.clone();
            async move { reply(node.display_peers().await) }
        })?;

        let node = self.clone();
        registry.register("acquire", move |_args: Args| {
            let node = node.clone();
            async move {
                node.acquire().await;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("release", move |_args: Args| {
            let node = node.clone();
            async move {
                node.release().await?;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("request_token", move |args: Args| {
            let node = node.clone();
            async move {
                let time: u64 = args.get(0, "time")?;
                let pid: PeerId = args.get(1, "pid")?;
                node.lock.request_token(time, pid).await;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("obtain_token", move |args: Args| {
            let node = node.clone();
            async move {
                let token: Token = args.get(0, "token")?;
                node.lock.obtain_token(token).await;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("display_status", move |_args: Args| {
            let node = node.clone();
            async move { reply(node.display_status().await) }
        })?;

        let node = self.clone();
        registry.register("register_peer", move |args: Args| {
            let node = node.clone();
            async move {
                let pid: PeerId = args.get(0, "pid")?;
                let address: PeerAddress = args.get(1, "address")?;
                node.register_peer(pid, address).await;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("unregister_peer", move |args: Args| {
            let node = node.clone();
            async move {
                let pid: PeerId = args.get(0, "pid")?;
                node.unregister_peer(pid).await?;
                reply(())
            }
        })?;

        Ok(())
    }

    /// Returns at once if this peer already holds the lock.
    pub async fn acquire(&self) {
        self.lock.acquire().await;
    }

    pub async fn release(&self) -> Result<(), LockError> {
        self.lock.release().await
    }

    pub async fn display_peers(&self) -> String {
        self.peer_list.display_peers().await
    }

    pub async fn display_status(&self) -> LockStatus {
        self.lock.display_status().await
    }

    /// Membership and lock bookkeeping change together.
    pub async fn register_peer(&self, pid: PeerId, address: PeerAddress) {
        self.lock.register_peer(pid, address).await;
    }

    pub async fn unregister_peer(&self, pid: PeerId) -> Result<(), MembershipError> {
        self.lock.unregister_peer(pid).await
    }

    /// Hands the token on, says goodbye to the other peers, then leaves the
    /// directory.
    pub async fn destroy(&self) -> Result<()> {
        self.lock.destroy().await;

        if let Err(e) = self.peer_list.destroy().await {
            tracing::warn!("Could not notify the other peers: {}", e);
        }

        self.peer.destroy().await
    }

    pub fn id(&self) -> PeerId {
        self.peer.id()
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    pub fn peer_list(&self) -> &Arc<PeerList> {
        &self.peer_list
    }

    pub fn lock(&self) -> &Arc<DistributedLock> {
        &self.lock
    }
}
