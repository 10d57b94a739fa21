//! Locking Module
//!
//! Cluster-wide mutual exclusion and the read-write lock built on it.
//!
//! ## Submodules
//! - **`distributed`**: the token lock. The peer with the lowest id starts
//!   with the token; requests are served in ring order.
//! - **`rwlock`**: a plain in-process readers-writer lock.
//! - **`distributed_rw`**: the two combined. Writers need the token and local
//!   exclusivity, readers only local access.
//! - **`remote`**: the calls peers make on each other's locks.
//!
//! Lock bookkeeping ([`LockBook`]) is stored in the membership module's
//! `ClusterState` so joins and leaves update it atomically.

pub mod distributed;
pub mod distributed_rw;
pub mod remote;
pub mod rwlock;
pub mod types;

pub use distributed::DistributedLock;
pub use distributed_rw::DistributedReadWriteLock;
pub use remote::LockStub;
pub use rwlock::ReadWriteLock;
pub use types::{LockBook, LockError, LockState, LockStatus, Token};
