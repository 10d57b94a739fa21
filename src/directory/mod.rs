//! Name Service
//!
//! Peers find each other through a directory that maps a peer type to the
//! set of `(id, address)` pairs registered under it.
//!
//! ## Submodules
//! - **`local`**: in-memory directory. Used in-process by tests and served
//!   over the ORB by the `directory` subcommand.
//! - **`remote`**: client for a directory running in another process.
//!
//! Both sides speak the same five calls, expressed by [`NameService`].

pub mod local;
pub mod remote;

pub use local::LocalDirectory;
pub use remote::RemoteDirectory;

use crate::orb::{PeerAddress, PeerId, RpcError};

use async_trait::async_trait;

#[async_trait]
pub trait NameService: Send + Sync {
    /// Registers `address` under `peer_type`, returning the new id and the
    /// hash that must be presented to unregister it.
    async fn register(
        &self,
        peer_type: &str,
        address: &PeerAddress,
    ) -> Result<(PeerId, String), RpcError>;

    async fn unregister(&self, id: PeerId, peer_type: &str, hash: &str) -> Result<(), RpcError>;

    /// Any registered peer of `peer_type`.
    async fn require_any(&self, peer_type: &str) -> Result<PeerAddress, RpcError>;

    async fn require_object(&self, peer_type: &str, id: PeerId) -> Result<PeerAddress, RpcError>;

    /// Every peer of `peer_type`, ordered by id.
    async fn require_all(&self, peer_type: &str) -> Result<Vec<(PeerId, PeerAddress)>, RpcError>;
}
