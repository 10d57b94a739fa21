//! Peer configuration.
//!
//! Values come from the command line (with environment fallbacks) in the
//! binaries and are built directly in tests.

use crate::orb::PeerAddress;

use rand::Rng;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_DIRECTORY_PORT: u16 = 42424;

/// Port range peers pick from when no port is given.
pub const PEER_PORT_RANGE: std::ops::Range<u16> = 40001..50000;

/// Reserved by the directory; never a valid peer type.
pub const PLACEHOLDER_TYPE: &str = "object";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("peer type must not be empty")]
    EmptyType,

    #[error("peer type '{0}' is reserved")]
    ReservedType(String),

    #[error("port 0 is only allowed for ephemeral peers")]
    EphemeralPort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Host the listener binds to and advertises.
    pub host: String,
    pub port: u16,
    pub peer_type: String,
    /// Where the name service listens.
    pub directory: PeerAddress,
}

impl PeerConfig {
    /// Default host and directory, random port from [`PEER_PORT_RANGE`].
    pub fn new(peer_type: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: random_port(),
            peer_type: peer_type.into(),
            directory: default_directory(),
        }
    }

    /// Loopback peer on an OS-assigned port.
    pub fn ephemeral(peer_type: impl Into<String>) -> Self {
        Self {
            port: 0,
            ..Self::new(peer_type)
        }
    }

    pub fn validate(&self, allow_ephemeral: bool) -> Result<(), ConfigError> {
        validate_peer_type(&self.peer_type)?;

        if self.port == 0 && !allow_ephemeral {
            return Err(ConfigError::EphemeralPort);
        }

        Ok(())
    }
}

/// Checks a peer type given on its own, as the client does before it
/// looks replicas up.
pub fn validate_peer_type(peer_type: &str) -> Result<(), ConfigError> {
    if peer_type.trim().is_empty() {
        return Err(ConfigError::EmptyType);
    }

    if peer_type == PLACEHOLDER_TYPE {
        return Err(ConfigError::ReservedType(peer_type.to_string()));
    }

    Ok(())
}

pub fn random_port() -> u16 {
    rand::thread_rng().gen_range(PEER_PORT_RANGE)
}

pub fn default_directory() -> PeerAddress {
    PeerAddress::new(DEFAULT_HOST, DEFAULT_DIRECTORY_PORT)
}
