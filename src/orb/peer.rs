//! Peer identity: one listener, one directory registration.

use super::registry::MethodRegistry;
use super::skeleton::Skeleton;
use super::types::{PeerAddress, PeerId};
use crate::config::PeerConfig;
use crate::directory::NameService;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// What other components need to know about the local peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub id: PeerId,
    pub peer_type: String,
    pub address: PeerAddress,
}

enum ListenerSlot {
    Bound(Skeleton),
    Serving(JoinHandle<()>),
    Stopped,
}

pub struct Peer {
    identity: PeerIdentity,
    hash: String,
    name_service: Arc<dyn NameService>,
    listener: Mutex<ListenerSlot>,
}

impl Peer {
    /// Binds the listener and registers `(type, address)` with the directory.
    ///
    /// The advertised address uses the configured host and the port actually
    /// bound, so a configured port of 0 still yields a reachable address.
    pub async fn start(config: &PeerConfig, name_service: Arc<dyn NameService>) -> Result<Arc<Self>> {
        let skeleton = Skeleton::bind(&config.host, config.port)
            .await
            .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

        let address = PeerAddress::new(config.host.clone(), skeleton.local_addr().port());

        let (id, hash) = name_service
            .register(&config.peer_type, &address)
            .await
            .context("Failed to register with the name service")?;

        tracing::info!(
            "Registered peer {} of type '{}' at {}",
            id,
            config.peer_type,
            address
        );

        Ok(Arc::new(Self {
            identity: PeerIdentity {
                id,
                peer_type: config.peer_type.clone(),
                address,
            },
            hash,
            name_service,
            listener: Mutex::new(ListenerSlot::Bound(skeleton)),
        }))
    }

    /// Begins dispatching incoming calls through `registry`.
    pub async fn serve(&self, registry: Arc<MethodRegistry>) -> Result<()> {
        let mut slot = self.listener.lock().await;

        match std::mem::replace(&mut *slot, ListenerSlot::Stopped) {
            ListenerSlot::Bound(skeleton) => {
                tracing::debug!(
                    "Peer {} serving methods: {:?}",
                    self.identity.id,
                    registry.method_names()
                );
                *slot = ListenerSlot::Serving(skeleton.serve(registry));
                Ok(())
            }
            serving @ ListenerSlot::Serving(_) => {
                *slot = serving;
                anyhow::bail!("peer {} is already serving", self.identity.id)
            }
            ListenerSlot::Stopped => anyhow::bail!("peer {} has been destroyed", self.identity.id),
        }
    }

    /// Unregisters from the directory and stops accepting connections.
    pub async fn destroy(&self) -> Result<()> {
        let unregistered = self
            .name_service
            .unregister(self.identity.id, &self.identity.peer_type, &self.hash)
            .await
            .context("Failed to unregister from the name service");

        if let ListenerSlot::Serving(handle) =
            std::mem::replace(&mut *self.listener.lock().await, ListenerSlot::Stopped)
        {
            handle.abort();
        }

        tracing::info!("Peer {} left", self.identity.id);

        unregistered
    }

    /// Liveness probe payload.
    pub fn check(&self) -> (PeerId, String) {
        (self.identity.id, self.identity.peer_type.clone())
    }

    pub fn id(&self) -> PeerId {
        self.identity.id
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn name_service(&self) -> Arc<dyn NameService> {
        self.name_service.clone()
    }
}
