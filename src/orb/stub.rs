//! Client-side proxy for a remote object.
//!
//! Every call opens a fresh connection, sends one request line, waits for one
//! response line and closes. There is no retry, pooling or timeout: a peer
//! that cannot be reached fails the call as soon as the connection attempt
//! fails.

use super::error::RpcError;
use super::protocol::{RpcRequest, RpcResponse};
use super::types::PeerAddress;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    address: PeerAddress,
}

impl Stub {
    /// Proxy for the object listening at `address`. No connection is made
    /// until the first call.
    pub fn new(address: PeerAddress) -> Self {
        Self { address }
    }

    /// Where calls are sent.
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// Invokes `method` on the remote object and returns the raw result.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let request = RpcRequest::new(method, args);
        let mut line = serde_json::to_string(&request).map_err(|e| RpcError::Protocol {
            address: self.address.clone(),
            reason: format!("cannot encode request: {}", e),
        })?;
        line.push('\n');

        tracing::trace!("-> {} {}", self.address, line.trim_end());

        let stream = TcpStream::connect((self.address.host.as_str(), self.address.port))
            .await
            .map_err(|e| self.communication(e))?;
        let (reader, mut writer) = stream.into_split();

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.communication(e))?;
        writer.flush().await.map_err(|e| self.communication(e))?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        let read = reader
            .read_line(&mut response)
            .await
            .map_err(|e| self.communication(e))?;

        if read == 0 {
            return Err(self.communication(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before a response arrived",
            )));
        }

        tracing::trace!("<- {} {}", self.address, response.trim_end());

        self.decode(&response)
    }

    /// Like [`Stub::call`], decoding the result into `R`.
    pub async fn invoke<R: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<R, RpcError> {
        let value = self.call(method, args).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Protocol {
            address: self.address.clone(),
            reason: format!("unexpected result for '{}': {}", method, e),
        })
    }

    fn decode(&self, line: &str) -> Result<Value, RpcError> {
        match serde_json::from_str::<RpcResponse>(line.trim_end()) {
            Ok(RpcResponse::Result(value)) => Ok(value),
            Ok(RpcResponse::Error(fault)) => Err(RpcError::Remote(fault)),
            Err(e) => Err(RpcError::Protocol {
                address: self.address.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn communication(&self, source: std::io::Error) -> RpcError {
        RpcError::Communication {
            address: self.address.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orb::protocol::FaultKind;

    fn stub() -> Stub {
        Stub::new(PeerAddress::new("127.0.0.1", 1))
    }

    #[test]
    fn test_decode_result() {
        let value = stub().decode("{\"result\": [1, 2]}\n").unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_decode_error_keeps_kind_and_args() {
        let err = stub()
            .decode(r#"{"error": {"name": "PeerNotFound", "args": [7]}}"#)
            .unwrap_err();

        assert_eq!(err.fault_kind(), Some(&FaultKind::PeerNotFound));
        match err {
            RpcError::Remote(fault) => assert_eq!(fault.args, vec![serde_json::json!(7)]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_fieldless_is_protocol_error() {
        assert!(matches!(
            stub().decode("{}"),
            Err(RpcError::Protocol { .. })
        ));
        assert!(matches!(
            stub().decode("not json"),
            Err(RpcError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_communication_failure() {
        // Bind and drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Stub::new(addr.into()).call("check", vec![]).await.unwrap_err();
        assert!(err.is_communication());
    }
}
