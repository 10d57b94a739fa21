use crate::config::PeerConfig;
use crate::directory::NameService;
use crate::membership::PeerList;
use crate::orb::{Args, MethodRegistry, Peer, PeerAddress, PeerId, RegistryError, reply};

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A peer that only keeps a peer list and exchanges text messages.
pub struct ChatPeer {
    peer: Arc<Peer>,
    peer_list: Arc<PeerList>,
    inbox: Mutex<Vec<(PeerId, String)>>,
}

impl ChatPeer {
    pub async fn start(config: &PeerConfig, name_service: Arc<dyn NameService>) -> Result<Arc<Self>> {
        let peer = Peer::start(config, name_service).await?;
        let peer_list = Arc::new(PeerList::new(&peer));

        let node = Arc::new(Self {
            peer,
            peer_list,
            inbox: Mutex::new(Vec::new()),
        });

        let registry = MethodRegistry::new();
        node.register_methods(&registry)?;
        node.peer.serve(registry).await?;
        node.peer_list
            .initialize()
            .await
            .context("Failed to initialize the peer list")?;

        Ok(node)
    }

    fn register_methods(self: &Arc<Self>, registry: &MethodRegistry) -> Result<(), RegistryError> {
        let node = self.clone();
        registry.register("check", move |_args: Args| {
            let node = node.clone();
            async move { reply(node.peer.check()) }
        })?;

        let node = self.clone();
        registry.register("display_peers", move |_args: Args| {
            let node = node.clone();
            async move { reply(node.peer_list.display_peers().await) }
        })?;

        let node = self.clone();
        registry.register("register_peer", move |args: Args| {
            let node = node.clone();
            async move {
                let pid: PeerId = args.get(0, "pid")?;
                let address: PeerAddress = args.get(1, "address")?;
                node.peer_list.register_peer(pid, address).await;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("unregister_peer", move |args: Args| {
            let node = node.clone();
            async move {
                let pid: PeerId = args.get(0, "pid")?;
                node.peer_list.unregister_peer(pid).await?;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("print_message", move |args: Args| {
            let node = node.clone();
            async move {
                let from: PeerId = args.get(0, "from")?;
                let text: String = args.get(1, "text")?;
                node.print_message(from, text).await;
                reply(())
            }
        })?;

        Ok(())
    }

    pub async fn print_message(&self, from: PeerId, text: String) {
        println!("Received a message from {}: {}", from, text);
        self.inbox.lock().await.push((from, text));
    }

    pub async fn send_message(&self, to: PeerId, text: &str) -> Result<()> {
        let stub = self
            .peer_list
            .peer(to)
            .await
            .with_context(|| format!("Cannot send messages to {}, it is not in the peer list", to))?;

        stub.call("print_message", vec![json!(self.peer.id()), json!(text)])
            .await
            .with_context(|| format!("Failed to deliver the message to {}", to))?;
        Ok(())
    }

    /// Messages received so far, oldest first.
    pub async fn inbox(&self) -> Vec<(PeerId, String)> {
        self.inbox.lock().await.clone()
    }

    pub async fn display_peers(&self) -> String {
        self.peer_list.display_peers().await
    }

    pub async fn destroy(&self) -> Result<()> {
        if let Err(e) = self.peer_list.destroy().await {
            tracing::warn!("Could not notify the other peers: {}", e);
        }
        self.peer.destroy().await
    }

    pub fn id(&self) -> PeerId {
        self.peer.id()
    }
}
