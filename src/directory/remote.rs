use super::NameService;
use crate::orb::{PeerAddress, PeerId, RpcError, Stub};

use async_trait::async_trait;
use serde_json::json;

/// Name service reached over the ORB.
#[derive(Debug, Clone)]
pub struct RemoteDirectory {
    stub: Stub,
}

impl RemoteDirectory {
    /// Client for the name service listening at `address`.
    pub fn new(address: PeerAddress) -> Self {
        Self {
            stub: Stub::new(address),
        }
    }

    pub fn address(&self) -> &PeerAddress {
        self.stub.address()
    }
}

#[async_trait]
impl NameService for RemoteDirectory {
    async fn register(
        &self,
        peer_type: &str,
        address: &PeerAddress,
    ) -> Result<(PeerId, String), RpcError> {
        self.stub
            .invoke("register", vec![json!(peer_type), json!(address)])
            .await
    }

    async fn unregister(&self, id: PeerId, peer_type: &str, hash: &str) -> Result<(), RpcError> {
        self.stub
            .call("unregister", vec![json!(id), json!(peer_type), json!(hash)])
            .await?;
        Ok(())
    }

    async fn require_any(&self, peer_type: &str) -> Result<PeerAddress, RpcError> {
        self.stub.invoke("require_any", vec![json!(peer_type)]).await
    }

    async fn require_object(&self, peer_type: &str, id: PeerId) -> Result<PeerAddress, RpcError> {
        self.stub
            .invoke("require_object", vec![json!(peer_type), json!(id)])
            .await
    }

    async fn require_all(&self, peer_type: &str) -> Result<Vec<(PeerId, PeerAddress)>, RpcError> {
        let mut peers: Vec<(PeerId, PeerAddress)> =
            self.stub.invoke("require_all", vec![json!(peer_type)]).await?;
        peers.sort_by_key(|(id, _)| *id);
        Ok(peers)
    }
}
