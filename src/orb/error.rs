use super::protocol::{FaultKind, RemoteFault};
use super::types::PeerAddress;

/// Everything that can go wrong with a single remote call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Connect, read or write failed (refused, reset, closed early).
    #[error("communication with {address} failed: {source}")]
    Communication {
        address: PeerAddress,
        #[source]
        source: std::io::Error,
    },

    /// The peer answered with something that is not a valid response.
    #[error("malformed response from {address}: {reason}")]
    Protocol { address: PeerAddress, reason: String },

    /// The remote handler failed.
    #[error("remote call failed: {0}")]
    Remote(RemoteFault),
}

impl RpcError {
    pub fn is_communication(&self) -> bool {
        matches!(self, RpcError::Communication { .. })
    }

    /// The fault kind when the remote side reported an application failure.
    pub fn fault_kind(&self) -> Option<&FaultKind> {
        match self {
            RpcError::Remote(fault) => Some(&fault.kind),
            _ => None,
        }
    }
}

impl From<RemoteFault> for RpcError {
    fn from(fault: RemoteFault) -> Self {
        RpcError::Remote(fault)
    }
}

/// Lets a handler relay a failed nested call to its own caller.
impl From<RpcError> for RemoteFault {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(fault) => fault,
            other => RemoteFault::internal(other.to_string()),
        }
    }
}
