//! Membership Module
//!
//! Keeps, on every peer, the map of peers of the same type and a callable
//! proxy for each of them.
//!
//! ## Core Mechanisms
//! - **Discovery**: on start a peer asks the directory for everyone of its
//!   type and announces itself to the peers with lower ids.
//! - **Join/Leave**: peers announce arrival and departure explicitly; the map
//!   never changes because a call failed.
//! - **Shared State**: the map lives in [`ClusterState`] next to the token
//!   lock's bookkeeping so both change under one mutex.

pub mod peer_list;
pub mod remote;
pub mod state;
pub mod types;

pub use peer_list::PeerList;
pub use remote::MembershipStub;
pub use state::{ClusterState, ClusterView};
pub use types::{MembershipError, PeerEntry};
