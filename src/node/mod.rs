//! Peer Roles
//!
//! Each role builds its components on one [`crate::orb::Peer`], declares its
//! method table and joins the cluster.
//!
//! ## Roles
//! - **`MutexPeer`**: membership + distributed lock.
//! - **`ReplicaPeer`**: a mutex peer serving a replicated record store
//!   (`read`, `write`, `write_local`).
//! - **`ChatPeer`**: membership + `print_message`.
//!
//! Start order is always: register with the directory, serve, initialize the
//! peer list, initialize the lock. Shutdown runs it backwards.

pub mod chat;
pub mod mutex;
pub mod replica;

pub use chat::ChatPeer;
pub use mutex::MutexPeer;
pub use replica::{ReplicaError, ReplicaPeer};
