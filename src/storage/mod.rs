//! Record Storage Module
//!
//! Append-only stores of text records that replicas serve through `read`
//! and `write`.
//!
//! ## Core Concepts
//! - **`RecordStore`**: random read, append write. Concurrency control is the
//!   caller's job (the replica's read-write lock).
//! - **`FortuneDatabase`**: file-backed, in the fortune format: records
//!   separated by a line holding a single `%`.
//! - **`MemoryStore`**: the same contract without a file.

pub mod fortune;
pub mod memory;
pub mod types;

pub use fortune::FortuneDatabase;
pub use memory::MemoryStore;
pub use types::{RecordStore, StoreError};
