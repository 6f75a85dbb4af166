//! Per-session spans.
//!
//! Every log line emitted while serving a connection carries the
//! connection id, the request id and the peer address through the span.

use std::net::SocketAddr;
use tracing::Span;

use crate::net::connection::ConnectionId;

/// Fresh request id (UUID v4).
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Span wrapping one client session.
pub fn session_span(connection_id: ConnectionId, request_id: &str, peer: SocketAddr) -> Span {
    tracing::info_span!(
        "session",
        connection_id = %connection_id,
        request_id = %request_id,
        peer = %peer,
    )
}
