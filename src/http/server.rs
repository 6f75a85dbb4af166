//! Proxy server.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Spawn one task per connection, each inside its own span
//! - Stop accepting on shutdown and give in-flight sessions a grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionId, ConnectionTracker, Listener};
use crate::observability::spans::{new_request_id, session_span};
use crate::proxy::session::{self, ProxyState};

/// HTTP caching proxy server.
pub struct ProxyServer {
    state: Arc<ProxyState>,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            state: Arc::new(ProxyState::from_config(config)),
            tracker: ConnectionTracker::new(),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        }
    }

    pub fn state(&self) -> &Arc<ProxyState> {
        &self.state
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Serve connections until `shutdown` fires.
    ///
    /// Returns the number of sessions still running when the grace period
    /// ran out.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> u64 {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                cache_root = %self.state.store.root().display(),
                expire_secs = self.state.policy.expire_after().as_secs(),
                "Proxy server starting"
            );
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            handle_connection(state, stream, peer, guard.id()).await;
                            drop(guard);
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        drop(listener);
        let remaining = self.tracker.wait_for_idle(self.shutdown_grace).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Grace period elapsed with sessions still running");
        } else {
            tracing::info!("All sessions finished");
        }
        remaining
    }
}

/// Serve a single connection: one request, one response, close.
async fn handle_connection(
    state: Arc<ProxyState>,
    stream: TcpStream,
    peer: SocketAddr,
    connection_id: ConnectionId,
) {
    let request_id = new_request_id();
    let span = session_span(connection_id, &request_id, peer);

    async move {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        session::serve(&state, &mut reader, &mut write_half, &request_id).await;

        if let Err(e) = write_half.shutdown().await {
            tracing::debug!(error = %e, "Client connection already closed");
        }
    }
    .instrument(span)
    .await
}
