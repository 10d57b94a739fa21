//! Wire Protocol
//!
//! One JSON object per line, one request per connection:
//!
//! ```text
//! -> {"method": "request_token", "args": [3, 2]}
//! <- {"result": null}
//! <- {"error": {"name": "PeerNotFound", "args": [7]}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single method invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
}

impl RpcRequest {
    pub fn new(method: &str, args: Vec<Value>) -> Self {
        Self {
            method: method.to_string(),
            args: Some(args),
        }
    }
}

/// The reply to an `RpcRequest`.
///
/// Externally tagged, so it encodes as `{"result": ..}` or `{"error": ..}`.
/// A line carrying neither key (or both) fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RpcResponse {
    Result(Value),
    Error(RemoteFault),
}

/// Enumerated failure kinds a peer can report back to its caller.
///
/// Encoded as a bare string so kinds produced by other implementations still
/// decode (as `Other`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FaultKind {
    UnknownMethod,
    InvalidRequest,
    InvalidArguments,
    PeerNotFound,
    TokenNotHeld,
    NotRegistered,
    InvalidHash,
    StorageFailure,
    Internal,
    Other(String),
}

impl FaultKind {
    pub fn as_str(&self) -> &str {
        match self {
            FaultKind::UnknownMethod => "UnknownMethod",
            FaultKind::InvalidRequest => "InvalidRequest",
            FaultKind::InvalidArguments => "InvalidArguments",
            FaultKind::PeerNotFound => "PeerNotFound",
            FaultKind::TokenNotHeld => "TokenNotHeld",
            FaultKind::NotRegistered => "NotRegistered",
            FaultKind::InvalidHash => "InvalidHash",
            FaultKind::StorageFailure => "StorageFailure",
            FaultKind::Internal => "Internal",
            FaultKind::Other(name) => name,
        }
    }
}

impl From<String> for FaultKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "UnknownMethod" => FaultKind::UnknownMethod,
            "InvalidRequest" => FaultKind::InvalidRequest,
            "InvalidArguments" => FaultKind::InvalidArguments,
            "PeerNotFound" => FaultKind::PeerNotFound,
            "TokenNotHeld" => FaultKind::TokenNotHeld,
            "NotRegistered" => FaultKind::NotRegistered,
            "InvalidHash" => FaultKind::InvalidHash,
            "StorageFailure" => FaultKind::StorageFailure,
            "Internal" => FaultKind::Internal,
            _ => FaultKind::Other(name),
        }
    }
}

impl From<FaultKind> for String {
    fn from(kind: FaultKind) -> Self {
        match kind {
            FaultKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by a remote handler, reconstructed on the caller side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteFault {
    #[serde(rename = "name")]
    pub kind: FaultKind,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RemoteFault {
    pub fn new(kind: FaultKind, args: Vec<Value>) -> Self {
        Self { kind, args }
    }

    /// Fault with a single human-readable message argument.
    pub fn message(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            args: vec![Value::String(message.into())],
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::message(FaultKind::Internal, message)
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|arg| arg.to_string()).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteFault {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_args_decodes() {
        let request: RpcRequest = serde_json::from_str(r#"{"method": "read"}"#).unwrap();
        assert_eq!(request.method, "read");
        assert!(request.args.is_none());
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(RpcResponse::Result(json!(null))).unwrap();
        assert_eq!(ok, json!({"result": null}));

        let fault = RemoteFault::new(FaultKind::PeerNotFound, vec![json!(7)]);
        let err = serde_json::to_value(RpcResponse::Error(fault)).unwrap();
        assert_eq!(err, json!({"error": {"name": "PeerNotFound", "args": [7]}}));
    }

    #[test]
    fn test_response_without_fields_is_rejected() {
        assert!(serde_json::from_str::<RpcResponse>(r#"{}"#).is_err());
        assert!(serde_json::from_str::<RpcResponse>(r#"{"value": 1}"#).is_err());
    }

    #[test]
    fn test_unknown_fault_kind_is_preserved() {
        let fault: RemoteFault =
            serde_json::from_str(r#"{"name": "KeyError", "args": ["x"]}"#).unwrap();
        assert_eq!(fault.kind, FaultKind::Other("KeyError".to_string()));
        assert_eq!(serde_json::to_value(&fault).unwrap()["name"], "KeyError");
    }
}
