//! Replicated record server: read any, write all.
//!
//! Reads are served from the local copy under a shared local lock. A write
//! takes the cluster token, applies the record locally and pushes it to
//! every other replica through `write_local`, which only takes local writer
//! exclusion (the token is already held by the coordinator).

use super::mutex::MutexPeer;
use crate::config::PeerConfig;
use crate::directory::NameService;
use crate::lock::{DistributedReadWriteLock, LockError};
use crate::orb::{Args, FaultKind, MethodRegistry, RegistryError, RemoteFault, Stub, reply};
use crate::storage::{RecordStore, StoreError};

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl From<ReplicaError> for RemoteFault {
    fn from(err: ReplicaError) -> Self {
        match err {
            ReplicaError::Store(e) => e.into(),
            ReplicaError::Lock(e) => e.into(),
        }
    }
}

pub struct ReplicaPeer {
    core: Arc<MutexPeer>,
    rwlock: DistributedReadWriteLock,
    store: Arc<dyn RecordStore>,
}

impl ReplicaPeer {
    pub async fn start(
        config: &PeerConfig,
        name_service: Arc<dyn NameService>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Arc<Self>> {
        let core = Arc::new(MutexPeer::build(config, name_service).await?);
        let rwlock = DistributedReadWriteLock::new(core.lock().clone());

        let node = Arc::new(Self {
            core,
            rwlock,
            store,
        });

        let registry = MethodRegistry::new();
        node.core.register_methods(&registry)?;
        node.register_methods(&registry)?;
        node.core.serve(registry).await?;

        Ok(node)
    }

    fn register_methods(self: &Arc<Self>, registry: &MethodRegistry) -> Result<(), RegistryError> {
        let node = self.clone();
        registry.register("read", move |_args: Args| {
            let node = node.clone();
            async move { reply(node.read().await?) }
        })?;

        let node = self.clone();
        registry.register("write", move |args: Args| {
            let node = node.clone();
            async move {
                let record: String = args.get(0, "record")?;
                node.write(record).await?;
                reply(())
            }
        })?;

        let node = self.clone();
        registry.register("write_local", move |args: Args| {
            let node = node.clone();
            async move {
                let record: String = args.get(0, "record")?;
                node.write_local(record).await?;
                reply(())
            }
        })?;

        Ok(())
    }

    pub async fn read(&self) -> Result<Option<String>, StoreError> {
        self.rwlock.read_acquire().await;
        let record = self.store.read().await;
        self.rwlock.read_release().await;
        record
    }

    /// Writes `record` on every reachable replica while holding the token.
    ///
    /// Replicas that cannot be reached are skipped; they are not retried.
    pub async fn write(&self, record: String) -> Result<(), ReplicaError> {
        self.rwlock.write_acquire().await;

        let written = self.store.write(record.clone()).await;
        if written.is_ok() {
            self.replicate(&record).await;
        }

        let released = self.rwlock.write_release().await;

        written?;
        released?;
        Ok(())
    }

    /// Applies a write coordinated by another replica.
    pub async fn write_local(&self, record: String) -> Result<(), StoreError> {
        self.rwlock.write_acquire_local().await;
        let written = self.store.write(record).await;
        self.rwlock.write_release_local().await;
        written
    }

    async fn replicate(&self, record: &str) {
        let owner = self.core.id();

        for entry in self.core.peer_list().get_peers().await {
            if entry.id == owner {
                continue;
            }

            let stub = Stub::new(entry.address);
            match stub.call("write_local", vec![json!(record)]).await {
                Ok(_) => tracing::debug!("Replicated to peer {}", entry.id),
                Err(e) if e.fault_kind() == Some(&FaultKind::StorageFailure) => {
                    tracing::error!("Peer {} refused the record: {}", entry.id, e)
                }
                Err(e) => tracing::warn!("Could not replicate to peer {}: {}", entry.id, e),
            }
        }
    }

    pub async fn destroy(&self) -> Result<()> {
        self.core.destroy().await
    }

    pub fn core(&self) -> &Arc<MutexPeer> {
        &self.core
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}
