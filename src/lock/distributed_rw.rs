//! Cluster-wide writer exclusion with local reader concurrency.

use super::distributed::DistributedLock;
use super::rwlock::ReadWriteLock;
use super::types::LockError;

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

pub struct DistributedReadWriteLock {
    local: ReadWriteLock,
    distributed: Arc<DistributedLock>,
    /// One local writer at a time owns the token. The permit is parked in
    /// `writer` between `write_acquire` and `write_release`.
    writers: Arc<Semaphore>,
    writer: Mutex<Option<OwnedSemaphorePermit>>,
}

impl DistributedReadWriteLock {
    pub fn new(distributed: Arc<DistributedLock>) -> Self {
        Self {
            local: ReadWriteLock::new(),
            distributed,
            writers: Arc::new(Semaphore::new(1)),
            writer: Mutex::new(None),
        }
    }

    pub async fn read_acquire(&self) {
        self.local.read_acquire().await;
    }

    pub async fn read_release(&self) {
        self.local.read_release().await;
    }

    /// Takes the cluster token first, then excludes local readers.
    ///
    /// Concurrent writers on this peer queue up before asking for the token,
    /// so each of them gets a critical section of its own.
    pub async fn write_acquire(&self) {
        let permit = self.writers.clone().acquire_owned().await.ok();

        self.distributed.acquire().await;
        self.local.write_acquire().await;

        *self.writer.lock().await = permit;
    }

    /// Gives back local exclusion, then the token, then lets the next local
    /// writer in.
    pub async fn write_release(&self) -> Result<(), LockError> {
        let permit = self.writer.lock().await.take();

        self.local.write_release().await;
        let released = self.distributed.release().await;

        drop(permit);
        released
    }

    /// Local exclusion only, for a replica applying a write on behalf of the
    /// peer that holds the token.
    pub async fn write_acquire_local(&self) {
        self.local.write_acquire().await;
    }

    pub async fn write_release_local(&self) {
        self.local.write_release().await;
    }

    pub fn distributed(&self) -> &Arc<DistributedLock> {
        &self.distributed
    }
}
