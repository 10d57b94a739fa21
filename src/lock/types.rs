use crate::orb::{FaultKind, PeerId, RemoteFault};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    NoToken,
    TokenPresent,
    TokenHeld,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockState::NoToken => "no token",
            LockState::TokenPresent => "token present",
            LockState::TokenHeld => "token held",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LockError {
    #[error("the token is not held by this peer")]
    TokenNotHeld,
}

impl From<LockError> for RemoteFault {
    fn from(err: LockError) -> Self {
        match err {
            LockError::TokenNotHeld => RemoteFault::message(FaultKind::TokenNotHeld, err.to_string()),
        }
    }
}

/// The mutual-exclusion token: for every peer, the request timestamp that
/// was last served to it.
///
/// Travels as a list of `[pid, timestamp]` pairs. Peers missing from the map
/// count as never served.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(PeerId, u64)>", into = "Vec<(PeerId, u64)>")]
pub struct Token {
    served: BTreeMap<PeerId, u64>,
}

impl Token {
    /// A fresh token with every given peer served at time 0.
    pub fn seeded(peers: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            served: peers.into_iter().map(|pid| (pid, 0)).collect(),
        }
    }

    /// Last request time served to `pid`, 0 if never.
    pub fn served(&self, pid: PeerId) -> u64 {
        self.served.get(&pid).copied().unwrap_or(0)
    }

    pub fn stamp(&mut self, pid: PeerId, time: u64) {
        self.served.insert(pid, time);
    }

    /// Starts tracking a new peer at time 0. Known peers keep their entry.
    pub fn admit(&mut self, pid: PeerId) {
        self.served.entry(pid).or_insert(0);
    }

    /// Forgets a peer that left.
    pub fn evict(&mut self, pid: PeerId) {
        self.served.remove(&pid);
    }

    pub fn entries(&self) -> Vec<(PeerId, u64)> {
        self.served.iter().map(|(pid, t)| (*pid, *t)).collect()
    }
}

impl From<Vec<(PeerId, u64)>> for Token {
    fn from(pairs: Vec<(PeerId, u64)>) -> Self {
        Self {
            served: pairs.into_iter().collect(),
        }
    }
}

impl From<Token> for Vec<(PeerId, u64)> {
    fn from(token: Token) -> Self {
        token.served.into_iter().collect()
    }
}

/// Per-peer bookkeeping of the token algorithm. Lives inside the cluster
/// state so it is always mutated together with the membership map.
#[derive(Debug, Clone)]
pub struct LockBook {
    /// Logical clock, bumped on every acquisition attempt.
    pub time: u64,
    /// Highest request timestamp seen from each peer. Never decreases.
    pub request: BTreeMap<PeerId, u64>,
    /// Present only while this peer holds the token.
    pub token: Option<Token>,
    pub state: LockState,
    /// A local acquire is waiting for the token; it must not be handed
    /// on before that acquire has taken it.
    pub waiting: bool,
}

impl LockBook {
    pub fn new() -> Self {
        Self {
            time: 0,
            request: BTreeMap::new(),
            token: None,
            state: LockState::NoToken,
            waiting: false,
        }
    }

    /// True in `TokenPresent` and `TokenHeld`.
    pub fn has_token(&self) -> bool {
        self.state != LockState::NoToken
    }

    /// Records a request, keeping the highest timestamp seen.
    pub fn record_request(&mut self, pid: PeerId, time: u64) {
        let seen = self.request.entry(pid).or_insert(0);
        *seen = (*seen).max(time);
    }

    pub fn admit(&mut self, pid: PeerId) {
        self.request.entry(pid).or_insert(0);
        if let Some(token) = self.token.as_mut() {
            token.admit(pid);
        }
    }

    pub fn evict(&mut self, pid: PeerId) {
        self.request.remove(&pid);
        if let Some(token) = self.token.as_mut() {
            token.evict(pid);
        }
    }

    /// First peer after `owner` in ring order whose latest request has not
    /// been served yet. `ring` must be sorted.
    pub fn next_holder(&self, owner: PeerId, ring: &[PeerId]) -> Option<PeerId> {
        let token = self.token.as_ref()?;

        let after = ring.iter().filter(|pid| **pid > owner);
        let before = ring.iter().filter(|pid| **pid < owner);

        after
            .chain(before)
            .copied()
            .find(|pid| self.request.get(pid).copied().unwrap_or(0) > token.served(*pid))
    }

    pub fn status(&self) -> LockStatus {
        LockStatus {
            state: self.state,
            request: self.request.iter().map(|(pid, t)| (*pid, *t)).collect(),
            token: self.token.as_ref().map(Token::entries),
            time: self.time,
        }
    }
}

impl Default for LockBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot returned by `display_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub state: LockState,
    pub request: Vec<(PeerId, u64)>,
    pub token: Option<Vec<(PeerId, u64)>>,
    pub time: u64,
}

fn render(pairs: &[(PeerId, u64)]) -> String {
    let items: Vec<String> = pairs
        .iter()
        .map(|(pid, t)| format!("{}: {}", pid, t))
        .collect();
    format!("{{{}}}", items.join(", "))
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "State   :: no token      : {}",
            self.state == LockState::NoToken
        )?;
        writeln!(
            f,
            "           token present : {}",
            self.state == LockState::TokenPresent
        )?;
        writeln!(
            f,
            "           token held    : {}",
            self.state == LockState::TokenHeld
        )?;
        writeln!(f, "Request :: {}", render(&self.request))?;
        match &self.token {
            Some(token) => writeln!(f, "Token   :: {}", render(token))?,
            None => writeln!(f, "Token   :: none")?,
        }
        write!(f, "Time    :: {}", self.time)
    }
}
