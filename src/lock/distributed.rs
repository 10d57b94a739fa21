//! Token-based distributed mutual exclusion (Ricart–Agrawala, second
//! algorithm).
//!
//! A single token circulates among the peers of one type. It records, for
//! every peer, the request timestamp last served to it. A peer wanting the
//! lock broadcasts its logical time; the holder, when done, hands the token
//! to the first peer after itself in ring order whose latest request has not
//! been served yet.

use super::remote::LockStub;
use super::types::{LockError, LockState, LockStatus, Token};
use crate::membership::{ClusterState, ClusterView, MembershipError, PeerList};
use crate::orb::{PeerAddress, PeerId};

use std::sync::Arc;

/// The lock is held by the peer, not by a task: once the token is held,
/// further `acquire` calls on the same peer return at once. Callers sharing
/// a peer serialize among themselves (see
/// [`super::DistributedReadWriteLock`]).
pub struct DistributedLock {
    owner: PeerId,
    state: Arc<ClusterState>,
}

impl DistributedLock {
    pub fn new(peer_list: &PeerList) -> Self {
        Self {
            owner: peer_list.owner().id,
            state: peer_list.state(),
        }
    }

    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// Seeds the request map from the membership map and elects the initial
    /// holder: the lowest id known locally gets the token.
    ///
    /// Must run after the peer list has been initialized.
    pub async fn initialize(&self) {
        let mut view = self.state.lock().await;
        let ring = view.ring();

        for pid in &ring {
            view.lock.request.entry(*pid).or_insert(0);
        }

        if ring.first() == Some(&self.owner) {
            view.lock.state = LockState::TokenPresent;
            view.lock.token = Some(Token::seeded(ring));
            tracing::info!("Peer {} starts with the token", self.owner);
        }
    }

    /// Gives the token away before leaving, if we have it.
    ///
    /// A waiting requester is served first. Otherwise the token goes to the
    /// ring predecessor, or the successor if the predecessor cannot be
    /// reached.
    pub async fn destroy(&self) {
        let mut view = self.state.lock().await;

        if !view.lock.has_token() || view.peers.len() <= 1 {
            return;
        }

        self.release_locked(&mut view).await;
        if !view.lock.has_token() {
            return;
        }

        let ring = view.ring();
        let predecessor = ring
            .iter()
            .rev()
            .find(|pid| **pid < self.owner)
            .or_else(|| ring.iter().rev().find(|pid| **pid != self.owner))
            .copied();
        let successor = ring
            .iter()
            .find(|pid| **pid > self.owner)
            .or_else(|| ring.iter().find(|pid| **pid != self.owner))
            .copied();

        let mut candidates: Vec<PeerId> = predecessor.into_iter().collect();
        if let Some(pid) = successor
            && !candidates.contains(&pid)
        {
            candidates.push(pid);
        }

        for pid in candidates {
            if self.hand_over(&mut view, pid).await {
                return;
            }
        }

        tracing::warn!("Peer {} leaves with the token, nobody could take it", self.owner);
    }

    /// A peer joined. Its address goes into the membership map and its
    /// request and token entries start at 0, under one lock.
    ///
    /// # Arguments
    /// * `pid` - Id handed out by the directory.
    /// * `address` - Where the new peer listens.
    pub async fn register_peer(&self, pid: PeerId, address: PeerAddress) {
        self.state.join(pid, address).await;
    }

    /// A peer left. Drops it from membership and from the lock bookkeeping.
    ///
    /// # Returns
    /// `PeerNotFound` if `pid` is not a member.
    pub async fn unregister_peer(&self, pid: PeerId) -> Result<(), MembershipError> {
        self.state.leave(pid).await
    }

    /// Blocks until this peer holds the token.
    ///
    /// The clock ticks on every call. If the token is already here (present
    /// or held) the call returns immediately with the state set to
    /// `TokenHeld`.
    pub async fn acquire(&self) {
        let (time, others) = {
            let mut view = self.state.lock().await;
            view.lock.time += 1;

            if view.lock.has_token() {
                view.lock.state = LockState::TokenHeld;
                tracing::info!("Peer {} took the lock", self.owner);
                return;
            }

            view.lock.waiting = true;
            let time = view.lock.time;
            view.lock.record_request(self.owner, time);
            (time, view.others(self.owner))
        };

        tracing::info!("Peer {} requests the token at time {}", self.owner, time);

        for (pid, stub) in others {
            if let Err(e) = stub.request_token(time, self.owner).await {
                tracing::warn!("Token request to peer {} failed: {}", pid, e);
            }
        }

        loop {
            let notified = self.state.token_arrived().notified();
            tokio::pin!(notified);
            // Register before looking so a wake-up between the check and the
            // await is not lost.
            notified.as_mut().enable();

            {
                let mut view = self.state.lock().await;
                if view.lock.has_token() {
                    view.lock.state = LockState::TokenHeld;
                    view.lock.waiting = false;
                    break;
                }
            }

            notified.await;
        }

        tracing::info!("Peer {} took the lock", self.owner);
    }

    /// Gives up the lock and passes the token to the next requester, if any.
    pub async fn release(&self) -> Result<(), LockError> {
        let mut view = self.state.lock().await;

        if view.lock.state == LockState::NoToken {
            return Err(LockError::TokenNotHeld);
        }

        self.release_locked(&mut view).await;
        drop(view);

        tracing::info!("Peer {} released the lock", self.owner);
        Ok(())
    }

    /// Another peer wants the token.
    pub async fn request_token(&self, time: u64, pid: PeerId) {
        let mut view = self.state.lock().await;
        view.lock.record_request(pid, time);

        tracing::debug!("Peer {} requests the token at time {}", pid, time);

        if view.lock.state == LockState::TokenPresent && !view.lock.waiting {
            self.release_locked(&mut view).await;
        }
    }

    /// The token arrives.
    ///
    /// A pending local acquire is woken up. If nobody here is waiting (the
    /// token was handed over by a leaving peer) it is passed on to any
    /// requester already on record.
    pub async fn obtain_token(self: &Arc<Self>, token: Token) {
        let forward = {
            let mut view = self.state.lock().await;
            view.lock.token = Some(token);
            view.lock.state = LockState::TokenPresent;

            let ring = view.ring();
            !view.lock.waiting && view.lock.next_holder(self.owner, &ring).is_some()
        };

        tracing::info!("Peer {} received the token", self.owner);
        self.state.token_arrived().notify_waiters();

        if forward {
            // The sender is still blocked on this call; pass it on from a
            // separate task.
            let lock = self.clone();
            tokio::spawn(async move {
                let mut view = lock.state.lock().await;
                if view.lock.state == LockState::TokenPresent && !view.lock.waiting {
                    lock.release_locked(&mut view).await;
                }
            });
        }
    }

    pub async fn display_status(&self) -> LockStatus {
        self.state.lock().await.lock.status()
    }

    /// Sets `TokenPresent` and tries to pass the token to the next requester
    /// in ring order. On failure the token stays here.
    async fn release_locked(&self, view: &mut ClusterView) {
        view.lock.state = LockState::TokenPresent;

        let ring = view.ring();
        let Some(next) = view.lock.next_holder(self.owner, &ring) else {
            tracing::debug!("No pending requests, peer {} keeps the token", self.owner);
            return;
        };

        self.hand_over(view, next).await;
    }

    /// Sends the token to `pid`. Returns whether it left this peer.
    async fn hand_over(&self, view: &mut ClusterView, pid: PeerId) -> bool {
        let Some(stub) = view.peers.get(&pid).cloned() else {
            return false;
        };

        let time = view.lock.time;
        let token = match view.lock.token.as_mut() {
            Some(token) => {
                token.stamp(self.owner, time);
                token.clone()
            }
            None => return false,
        };

        match stub.obtain_token(&token).await {
            Ok(()) => {
                view.lock.token = None;
                view.lock.state = LockState::NoToken;
                tracing::info!("Token passed from peer {} to peer {}", self.owner, pid);
                true
            }
            Err(e) => {
                tracing::warn!("Could not pass the token to peer {}: {}", pid, e);
                false
            }
        }
    }
}
