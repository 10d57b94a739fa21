use crate::orb::{PeerAddress, PeerId, RpcError, Stub};

use async_trait::async_trait;
use serde_json::json;

/// Membership calls on a remote peer.
#[async_trait]
pub trait MembershipStub {
    async fn register_peer(&self, pid: PeerId, address: &PeerAddress) -> Result<(), RpcError>;
    async fn unregister_peer(&self, pid: PeerId) -> Result<(), RpcError>;
}

#[async_trait]
impl MembershipStub for Stub {
    async fn register_peer(&self, pid: PeerId, address: &PeerAddress) -> Result<(), RpcError> {
        self.call("register_peer", vec![json!(pid), json!(address)])
            .await?;
        Ok(())
    }

    async fn unregister_peer(&self, pid: PeerId) -> Result<(), RpcError> {
        self.call("unregister_peer", vec![json!(pid)]).await?;
        Ok(())
    }
}
