//! Server-side listener.
//!
//! Accepts connections forever and spawns one task per connection. Each task
//! reads one request line, dispatches it through the peer's
//! [`MethodRegistry`], writes one response line and closes the connection.
//! A failing or panicking handler only ever produces an error response.

use super::protocol::{FaultKind, RemoteFault, RpcRequest, RpcResponse};
use super::registry::MethodRegistry;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct Skeleton {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Skeleton {
    /// Binds the listening socket. Connections queue in the backlog until
    /// [`Skeleton::serve`] is called.
    pub async fn bind(host: &str, port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop in the background.
    pub fn serve(self, registry: Arc<MethodRegistry>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.accept_loop(registry).await;
        })
    }

    async fn accept_loop(self, registry: Arc<MethodRegistry>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    tracing::debug!("Serving a request from {}", remote);
                    let registry = registry.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry).await {
                            tracing::warn!("The connection to {} has died: {}", remote, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, registry: Arc<MethodRegistry>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // Raw bytes, so a line that is not UTF-8 still gets an answer.
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await? == 0 {
        // Caller went away without sending anything.
        return Ok(());
    }

    let response = process_request(&line, &registry).await;

    let mut encoded = serde_json::to_string(&response)?;
    encoded.push('\n');
    writer.write_all(encoded.as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await?;

    Ok(())
}

/// Decodes one request line and runs it against `registry`.
pub async fn process_request(line: &[u8], registry: &Arc<MethodRegistry>) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_slice(line.trim_ascii_end()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejecting malformed request: {}", e);
            return RpcResponse::Error(RemoteFault::message(
                FaultKind::InvalidRequest,
                e.to_string(),
            ));
        }
    };

    let method = request.method;
    let args = request.args.unwrap_or_default();

    // The handler runs in its own task so a panic is contained and reported.
    let dispatched = {
        let registry = registry.clone();
        let method = method.clone();
        tokio::spawn(async move { registry.dispatch(&method, args).await }).await
    };

    match dispatched {
        Ok(Ok(value)) => RpcResponse::Result(value),
        Ok(Err(fault)) => {
            tracing::debug!("Method '{}' failed: {}", method, fault);
            RpcResponse::Error(fault)
        }
        Err(e) => {
            tracing::error!("Method '{}' aborted: {}", method, e);
            RpcResponse::Error(RemoteFault::internal(format!(
                "method '{}' aborted",
                method
            )))
        }
    }
}
