use crate::orb::{FaultKind, PeerAddress, PeerId, RemoteFault};

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MembershipError {
    #[error("no peer with id {0}")]
    PeerNotFound(PeerId),
}

impl From<MembershipError> for RemoteFault {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::PeerNotFound(pid) => {
                RemoteFault::new(FaultKind::PeerNotFound, vec![json!(pid)])
            }
        }
    }
}

/// One row of the membership map, as handed out by `get_peers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub id: PeerId,
    pub address: PeerAddress,
}
