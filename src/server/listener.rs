use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::http::connection::Connection;
use crate::proxy::pipeline::Pipeline;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Accepts connections until `shutdown` fires (or its sender is dropped).
///
/// Connections already accepted keep running after the listener stops.
pub async fn run(listener: TcpListener, pipeline: Arc<Pipeline>, mut shutdown: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Listener stopped");
                break;
            }

            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                };
                debug!("Accepted connection from {}", peer);

                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let mut conn = Connection::new(socket, peer, pipeline);
                    if let Err(e) = conn.run().await {
                        debug!("Connection error from {}: {}", peer, e);
                    }
                });
            }
        }
    }
}
