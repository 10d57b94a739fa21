//! Object Request Broker
//!
//! Turns method calls on a local proxy into JSON-over-TCP requests and back.
//!
//! ## Components
//! - **`Stub`**: the local image of a remote object. One connection per call,
//!   fully synchronous from the caller's point of view.
//! - **`Skeleton`**: accepts connections and runs each request in its own task.
//! - **`MethodRegistry`**: the explicit method table a peer role exposes.
//! - **`Peer`**: a process's identity in the cluster (directory registration +
//!   listener).
//!
//! Failures come back as [`RpcError`]; application failures on the remote side
//! arrive as a tagged [`RemoteFault`] that callers match on by kind.

pub mod error;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod skeleton;
pub mod stub;
pub mod types;

pub use error::RpcError;
pub use peer::{Peer, PeerIdentity};
pub use protocol::{FaultKind, RemoteFault, RpcRequest, RpcResponse};
pub use registry::{Args, MethodRegistry, RegistryError, reply};
pub use skeleton::Skeleton;
pub use stub::Stub;
pub use types::{PeerAddress, PeerId};

#[cfg(test)]
mod tests;
