//! Peer Cluster Library
//!
//! Peers of the same type find each other through a directory, call each
//! other's methods over a small JSON-over-TCP broker, and coordinate writes
//! to replicated data with a token-passing distributed lock.
//!
//! ## Architecture Modules
//! - **`orb`**: the broker. Stubs, the listener, the per-role method table
//!   and the peer identity.
//! - **`directory`**: the name service contract, an in-memory implementation
//!   and a remote client.
//! - **`membership`**: the per-peer list of peers of the same type, kept in
//!   sync through explicit join/leave calls.
//! - **`lock`**: Ricart–Agrawala token lock, a local readers-writer lock and
//!   the distributed read-write lock combining them.
//! - **`storage`**: append-only record stores (fortune files).
//! - **`node`**: the peer roles built from the above (mutex, replica, chat).
//! - **`config`**: peer configuration and its defaults.

pub mod config;
pub mod directory;
pub mod lock;
pub mod membership;
pub mod node;
pub mod orb;
pub mod storage;
