//! ORB Tests
//!
//! Exercises the broker end to end over loopback TCP.
//!
//! ## Test Scopes
//! - **Registry**: registration rules and dispatch.
//! - **Round trip**: arguments and results survive the wire unchanged.
//! - **Failure isolation**: remote faults, panics and garbage input never take
//!   the listener down.
//! - **Peer**: directory registration and liveness probe.

#[cfg(test)]
mod tests {
    use crate::config::PeerConfig;
    use crate::directory::{LocalDirectory, NameService};
    use crate::orb::{
        Args, FaultKind, MethodRegistry, Peer, PeerId, RegistryError, RemoteFault, RpcError,
        Skeleton, Stub, reply,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn serve(registry: Arc<MethodRegistry>) -> Stub {
        let skeleton = Skeleton::bind("127.0.0.1", 0).await.unwrap();
        let addr = skeleton.local_addr();
        skeleton.serve(registry);
        Stub::new(addr.into())
    }

    fn echo_registry() -> Arc<MethodRegistry> {
        let registry = MethodRegistry::new();

        registry
            .register("echo", |args: Args| async move { args.get::<Value>(0, "value") })
            .unwrap();

        registry
            .register("add", |args: Args| async move {
                let a: i64 = args.get(0, "a")?;
                let b: i64 = args.get(1, "b")?;
                reply(a + b)
            })
            .unwrap();

        registry
            .register("fail", |args: Args| async move {
                let id: u32 = args.get(0, "id")?;
                Err::<Value, _>(RemoteFault::new(FaultKind::PeerNotFound, vec![json!(id)]))
            })
            .unwrap();

        registry
            .register("explode", |_args: Args| async move {
                if true {
                    panic!("handler blew up");
                }
                Ok::<_, RemoteFault>(Value::Null)
            })
            .unwrap();

        registry
    }

    // ============================================================
    // REGISTRY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_registry_rejects_duplicate_names() {
        let registry = MethodRegistry::new();
        registry
            .register("check", |_args: Args| async { Ok::<_, RemoteFault>(Value::Null) })
            .unwrap();

        let again = registry.register("check", |_args: Args| async { Ok::<_, RemoteFault>(Value::Null) });

        assert!(matches!(again, Err(RegistryError::Duplicate(name)) if name == "check"));
        assert_eq!(registry.method_names(), vec!["check".to_string()]);
    }

    #[tokio::test]
    async fn test_registry_unknown_method() {
        let registry = MethodRegistry::new();
        let fault = registry.dispatch("missing", vec![]).await.unwrap_err();

        assert_eq!(fault.kind, FaultKind::UnknownMethod);
        assert_eq!(fault.args, vec![json!("missing")]);
    }

    #[tokio::test]
    async fn test_registry_bad_arguments() {
        let registry = echo_registry();
        let fault = registry
            .dispatch("add", vec![json!(1), json!("two")])
            .await
            .unwrap_err();

        assert_eq!(fault.kind, FaultKind::InvalidArguments);
    }

    // ============================================================
    // ROUND TRIP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_round_trip_preserves_structure() {
        let stub = serve(echo_registry()).await;

        let samples = vec![
            json!(42),
            json!("fortune"),
            json!(null),
            json!([1, "two", [3.5, false]]),
            json!({"peers": {"1": ["127.0.0.1", 40001]}, "nested": {"deep": [1, 2, {"x": null}]}}),
        ];

        for sample in samples {
            let back = stub.call("echo", vec![sample.clone()]).await.unwrap();
            assert_eq!(back, sample);
        }
    }

    #[tokio::test]
    async fn test_typed_invoke() {
        let stub = serve(echo_registry()).await;
        let sum: i64 = stub.invoke("add", vec![json!(40), json!(2)]).await.unwrap();
        assert_eq!(sum, 42);
    }

    #[tokio::test]
    async fn test_remote_fault_is_reconstructed() {
        let stub = serve(echo_registry()).await;

        let err = stub.call("fail", vec![json!(7)]).await.unwrap_err();

        match err {
            RpcError::Remote(fault) => {
                assert_eq!(fault.kind, FaultKind::PeerNotFound);
                assert_eq!(fault.args, vec![json!(7)]);
            }
            other => panic!("expected a remote fault, got {:?}", other),
        }
    }

    // ============================================================
    // FAILURE ISOLATION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_listener() {
        let stub = serve(echo_registry()).await;

        let err = stub.call("explode", vec![]).await.unwrap_err();
        assert_eq!(err.fault_kind(), Some(&FaultKind::Internal));

        // Unrelated calls still go through.
        let sum: i64 = stub.invoke("add", vec![json!(1), json!(1)]).await.unwrap();
        assert_eq!(sum, 2);
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_line() {
        let stub = serve(echo_registry()).await;
        let addr = stub.address().clone();

        let stream = tokio::net::TcpStream::connect((addr.host.as_str(), addr.port))
            .await
            .unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"this is not json\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();

        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["error"]["name"], "InvalidRequest");

        // Listener is still alive.
        assert_eq!(stub.call("echo", vec![json!(1)]).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_non_utf8_request_gets_error_line() {
        let stub = serve(echo_registry()).await;
        let addr = stub.address().clone();

        let stream = tokio::net::TcpStream::connect((addr.host.as_str(), addr.port))
            .await
            .unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"method\": \"\xff\xfe\"}\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();

        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["error"]["name"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_request_without_args_field() {
        let stub = serve(echo_registry()).await;
        let addr = stub.address().clone();

        let stream = tokio::net::TcpStream::connect((addr.host.as_str(), addr.port))
            .await
            .unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"method\": \"add\"}\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();

        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["error"]["name"], "InvalidArguments");
    }

    // ============================================================
    // PEER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_peer_start_check_destroy() {
        let directory = Arc::new(LocalDirectory::new());
        let config = PeerConfig::ephemeral("orb_test");

        let peer = Peer::start(&config, directory.clone()).await.unwrap();
        assert_eq!(peer.check(), (PeerId(1), "orb_test".to_string()));

        let listed = directory.require_all("orb_test").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1, peer.identity().address);

        let registry = MethodRegistry::new();
        let probe = peer.clone();
        registry
            .register("check", move |_args: Args| {
                let probe = probe.clone();
                async move { reply(probe.check()) }
            })
            .unwrap();
        peer.serve(registry.clone()).await.unwrap();
        assert!(peer.serve(registry).await.is_err());

        let stub = Stub::new(peer.identity().address.clone());
        let (id, peer_type): (PeerId, String) = stub.invoke("check", vec![]).await.unwrap();
        assert_eq!(id, PeerId(1));
        assert_eq!(peer_type, "orb_test");

        peer.destroy().await.unwrap();
        assert!(directory.require_all("orb_test").await.unwrap().is_empty());
    }
}
