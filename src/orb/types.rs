use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Cluster-wide peer identifier handed out by the directory at registration.
///
/// Ids are totally ordered; that order is the ring order used when passing
/// the mutual-exclusion token around.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network location of a peer's listener.
///
/// Travels on the wire as a `[host, port]` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<(String, u16)> for PeerAddress {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<PeerAddress> for (String, u16) {
    fn from(addr: PeerAddress) -> Self {
        (addr.host, addr.port)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a correct address, expected host:port")]
pub struct AddressParseError(pub String);

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError(s.to_string()))?;

        if host.is_empty() {
            return Err(AddressParseError(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError(s.to_string()))?;

        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_wire_form_is_pair() {
        let addr = PeerAddress::new("node-a.local", 40123);
        let json = serde_json::to_value(&addr).unwrap();

        assert_eq!(json, serde_json::json!(["node-a.local", 40123]));
    }

    #[test]
    fn test_address_parse() {
        let addr: PeerAddress = "127.0.0.1:42424".parse().unwrap();
        assert_eq!(addr, PeerAddress::new("127.0.0.1", 42424));

        assert!("no-port".parse::<PeerAddress>().is_err());
        assert!(":42424".parse::<PeerAddress>().is_err());
        assert!("host:99999".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_peer_id_is_plain_number_on_wire() {
        assert_eq!(serde_json::to_string(&PeerId(7)).unwrap(), "7");
        let id: PeerId = serde_json::from_str("12").unwrap();
        assert_eq!(id, PeerId(12));
    }
}
