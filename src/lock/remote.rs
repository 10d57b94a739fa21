use super::types::Token;
use crate::orb::{PeerId, RpcError, Stub};

use async_trait::async_trait;
use serde_json::json;

/// Token-lock calls on a remote peer.
#[async_trait]
pub trait LockStub {
    async fn request_token(&self, time: u64, pid: PeerId) -> Result<(), RpcError>;
    async fn obtain_token(&self, token: &Token) -> Result<(), RpcError>;
}

#[async_trait]
impl LockStub for Stub {
    async fn request_token(&self, time: u64, pid: PeerId) -> Result<(), RpcError> {
        self.call("request_token", vec![json!(time), json!(pid)])
            .await?;
        Ok(())
    }

    async fn obtain_token(&self, token: &Token) -> Result<(), RpcError> {
        self.call("obtain_token", vec![json!(token)]).await?;
        Ok(())
    }
}
