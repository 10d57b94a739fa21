//! Cluster Integration Tests
//!
//! Several peers in one process, each with its own listener, sharing a name
//! service.
//!
//! ## Test Scopes
//! - **Mutual exclusion & liveness**: concurrent acquire/release loops.
//! - **Fairness**: requests are served in ring order from the holder.
//! - **Election**: the lowest id starts with the token whatever the start order.
//! - **Replication**: writes reach every reachable replica.
//! - **Membership**: join/leave round trip through the wire.

use async_trait::async_trait;
use peer_cluster::config::PeerConfig;
use peer_cluster::directory::{LocalDirectory, NameService, RemoteDirectory};
use peer_cluster::lock::{LockBook, LockState, Token};
use peer_cluster::membership::MembershipStub;
use peer_cluster::node::{MutexPeer, ReplicaPeer};
use peer_cluster::orb::{FaultKind, MethodRegistry, PeerAddress, PeerId, RpcError, Skeleton, Stub};
use peer_cluster::storage::MemoryStore;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const PATIENCE: Duration = Duration::from_secs(60);

/// Hands out a fixed sequence of ids instead of counting up.
struct FixedIds {
    inner: LocalDirectory,
    ids: Mutex<VecDeque<PeerId>>,
}

impl FixedIds {
    fn new(ids: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalDirectory::new(),
            ids: Mutex::new(ids.iter().map(|id| PeerId(*id)).collect()),
        })
    }
}

#[async_trait]
impl NameService for FixedIds {
    async fn register(
        &self,
        peer_type: &str,
        address: &PeerAddress,
    ) -> Result<(PeerId, String), RpcError> {
        let id = self.ids.lock().await.pop_front().expect("ran out of ids");
        let hash = self.inner.register_with_id(id, peer_type, address).await?;
        Ok((id, hash))
    }

    async fn unregister(&self, id: PeerId, peer_type: &str, hash: &str) -> Result<(), RpcError> {
        self.inner.unregister(id, peer_type, hash).await
    }

    async fn require_any(&self, peer_type: &str) -> Result<PeerAddress, RpcError> {
        self.inner.require_any(peer_type).await
    }

    async fn require_object(&self, peer_type: &str, id: PeerId) -> Result<PeerAddress, RpcError> {
        self.inner.require_object(peer_type, id).await
    }

    async fn require_all(&self, peer_type: &str) -> Result<Vec<(PeerId, PeerAddress)>, RpcError> {
        self.inner.require_all(peer_type).await
    }
}

async fn mutex_cluster(name_service: Arc<dyn NameService>, size: usize) -> Vec<Arc<MutexPeer>> {
    let mut peers = Vec::new();
    for _ in 0..size {
        let peer = MutexPeer::start(&PeerConfig::ephemeral("mutex"), name_service.clone())
            .await
            .unwrap();
        peers.push(peer);
    }
    peers
}

async fn state_of(peer: &MutexPeer) -> LockState {
    peer.display_status().await.state
}

// ============================================================
// MUTUAL EXCLUSION & LIVENESS
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_one_holder_under_contention() {
    let peers = mutex_cluster(Arc::new(LocalDirectory::new()), 4).await;

    let inside = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for peer in &peers {
        let peer = peer.clone();
        let inside = inside.clone();
        let entries = entries.clone();

        workers.push(tokio::spawn(async move {
            for _ in 0..5 {
                peer.acquire().await;

                let before = inside.fetch_add(1, Ordering::SeqCst);
                assert_eq!(before, 0, "two peers inside the critical section");
                entries.fetch_add(1, Ordering::SeqCst);

                tokio::time::sleep(Duration::from_millis(5)).await;

                inside.fetch_sub(1, Ordering::SeqCst);
                peer.release().await.unwrap();
            }
        }));
    }

    for worker in workers {
        tokio::time::timeout(PATIENCE, worker)
            .await
            .expect("every acquire should complete")
            .unwrap();
    }

    assert_eq!(entries.load(Ordering::SeqCst), 20);

    let mut holders = 0;
    for peer in &peers {
        let state = state_of(peer).await;
        assert_ne!(state, LockState::TokenHeld);
        if state == LockState::TokenPresent {
            holders += 1;
        }
    }
    assert_eq!(holders, 1, "exactly one token in the cluster");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cluster_over_remote_directory() {
    let directory = Arc::new(LocalDirectory::new());
    let registry = MethodRegistry::new();
    directory.register_methods(&registry).unwrap();

    let skeleton = Skeleton::bind("127.0.0.1", 0).await.unwrap();
    let remote = Arc::new(RemoteDirectory::new(skeleton.local_addr().into()));
    skeleton.serve(registry);

    let peers = mutex_cluster(remote, 3).await;

    tokio::time::timeout(PATIENCE, peers[2].acquire())
        .await
        .expect("acquire through a remote directory");
    assert_eq!(state_of(&peers[2]).await, LockState::TokenHeld);
    peers[2].release().await.unwrap();

    peers[2].destroy().await.unwrap();
    assert_eq!(directory.require_all("mutex").await.unwrap().len(), 2);
}

// ============================================================
// FAIRNESS
// ============================================================

#[test]
fn test_ring_order_decides_next_holder() {
    let mut book = LockBook::new();
    book.state = LockState::TokenPresent;
    book.token = Some(Token::seeded([PeerId(1), PeerId(2), PeerId(3)]));
    book.record_request(PeerId(2), 1);
    book.record_request(PeerId(3), 2);

    let ring = [PeerId(1), PeerId(2), PeerId(3)];
    assert_eq!(book.next_holder(PeerId(1), &ring), Some(PeerId(2)));

    // Peer 2 got the token and released it, stamping its own entry.
    if let Some(token) = book.token.as_mut() {
        token.stamp(PeerId(2), 1);
    }
    assert_eq!(book.next_holder(PeerId(2), &ring), Some(PeerId(3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_served_in_ring_order() {
    let peers = mutex_cluster(Arc::new(LocalDirectory::new()), 3).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    // Move peer 3's clock ahead so the two requests carry different times.
    for _ in 0..3 {
        peers[2].acquire().await;
        peers[2].release().await.unwrap();
    }
    assert_eq!(peers[2].display_status().await.time, 3);

    peers[0].acquire().await;

    let mut waiters = Vec::new();
    for peer in [&peers[1], &peers[2]] {
        let peer = peer.clone();
        let order = order.clone();
        waiters.push(tokio::spawn(async move {
            peer.acquire().await;
            order.lock().await.push(peer.id());
            peer.release().await.unwrap();
        }));
        // Peer 2 asks strictly before peer 3.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let status = peers[0].display_status().await;
    assert_eq!(
        status.request,
        vec![(PeerId(1), 1), (PeerId(2), 1), (PeerId(3), 4)]
    );

    peers[0].release().await.unwrap();

    for waiter in waiters {
        tokio::time::timeout(PATIENCE, waiter)
            .await
            .expect("both requesters are served")
            .unwrap();
    }

    assert_eq!(*order.lock().await, vec![PeerId(2), PeerId(3)]);
}

// ============================================================
// ELECTION
// ============================================================

/// Registers every peer first, then initializes them in `order`.
async fn elect(ids: &[u32], order: &[usize]) -> Vec<Arc<MutexPeer>> {
    let name_service = FixedIds::new(ids);

    let mut peers = Vec::new();
    for _ in ids {
        let peer = Arc::new(
            MutexPeer::build(&PeerConfig::ephemeral("election"), name_service.clone())
                .await
                .unwrap(),
        );
        let registry = MethodRegistry::new();
        peer.register_methods(&registry).unwrap();
        peer.peer().serve(registry).await.unwrap();
        peers.push(peer);
    }

    for index in order {
        let peer = &peers[*index];
        peer.peer_list().initialize().await.unwrap();
        peer.lock().initialize().await;
    }

    peers
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lowest_id_wins_election() {
    let ids = [5, 2, 9, 1];

    for order in [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1]] {
        let peers = elect(&ids, &order).await;

        for peer in &peers {
            let expected = if peer.id() == PeerId(1) {
                LockState::TokenPresent
            } else {
                LockState::NoToken
            };
            assert_eq!(state_of(peer).await, expected, "order {:?}", order);
        }

        let winner = peers.iter().find(|p| p.id() == PeerId(1)).unwrap();
        let token = winner.display_status().await.token.unwrap();
        let served: Vec<PeerId> = token.into_iter().map(|(pid, _)| pid).collect();
        assert_eq!(served, vec![PeerId(1), PeerId(2), PeerId(5), PeerId(9)]);
    }
}

// ============================================================
// REPLICATION
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_write_all_skips_unreachable_replica() {
    let directory = Arc::new(LocalDirectory::new());
    let mut stores = Vec::new();
    let mut replicas = Vec::new();

    for _ in 0..3 {
        let store = Arc::new(MemoryStore::new());
        replicas.push(
            ReplicaPeer::start(&PeerConfig::ephemeral("fortune"), directory.clone(), store.clone())
                .await
                .unwrap(),
        );
        stores.push(store);
    }

    // A replica that joined and then crashed without saying goodbye.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr: PeerAddress = dead.local_addr().unwrap().into();
    drop(dead);
    for replica in &replicas {
        replica.core().register_peer(PeerId(9), dead_addr.clone()).await;
    }

    let coordinator = Stub::new(replicas[1].core().peer().identity().address.clone());
    tokio::time::timeout(
        PATIENCE,
        coordinator.call("write", vec![serde_json::json!("Fortune favours the bold")]),
    )
    .await
    .expect("write should not hang on the dead replica")
    .unwrap();

    for store in &stores {
        assert_eq!(store.records().await, vec!["Fortune favours the bold"]);
    }

    // Any replica can serve the read.
    for replica in &replicas {
        let stub = Stub::new(replica.core().peer().identity().address.clone());
        let fortune: Option<String> = stub.invoke("read", vec![]).await.unwrap();
        assert_eq!(fortune.as_deref(), Some("Fortune favours the bold"));
    }
}

// ============================================================
// MEMBERSHIP
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_membership_round_trip() {
    let peers = mutex_cluster(Arc::new(LocalDirectory::new()), 2).await;
    let stub = Stub::new(peers[0].peer().identity().address.clone());

    let before = peers[0].peer_list().get_peers().await;
    let status_before = peers[0].display_status().await;

    stub.register_peer(PeerId(7), &PeerAddress::new("127.0.0.1", 40007))
        .await
        .unwrap();
    assert_eq!(peers[0].peer_list().get_peers().await.len(), 3);

    stub.unregister_peer(PeerId(7)).await.unwrap();
    assert_eq!(peers[0].peer_list().get_peers().await, before);
    assert_eq!(peers[0].display_status().await, status_before);

    let err = stub.unregister_peer(PeerId(7)).await.unwrap_err();
    assert_eq!(err.fault_kind(), Some(&FaultKind::PeerNotFound));
}
