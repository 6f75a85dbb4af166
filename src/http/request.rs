//! Request line parsing and target normalization.
//!
//! # Responsibilities
//! - Split a request line into method, target and version
//! - Build the request line + headers sent to an origin
//! - Normalize target paths for cache keys
//!
//! No validation beyond whitespace splitting happens here; the session
//! decides which methods and versions it serves.

use crate::error::{ProxyError, ProxyResult};

/// The only protocol version spoken on either side.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// First line of a request: `GET /path HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

impl RequestLine {
    /// Parse a request line. Anything other than three whitespace-separated
    /// tokens is [`ProxyError::MalformedLine`].
    pub fn parse(line: &str) -> ProxyResult<Self> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version), None) => Ok(Self {
                method: method.to_string(),
                target: target.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ProxyError::MalformedLine(line.to_string())),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_supported_version(&self) -> bool {
        self.version == HTTP_VERSION
    }
}

/// Strip every leading `/` from a request target.
pub fn normalize_target(target: &str) -> &str {
    target.trim_start_matches('/')
}

/// Last `/`-delimited segment of a path.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Render a GET request head for an origin.
///
/// `since` adds an `If-modified-since` header, turning it into a conditional
/// GET.
pub fn origin_get(path: &str, host: &str, port: u16, since: Option<&str>) -> String {
    let mut head = format!(
        "GET /{} {}\r\nHost: {}:{}\r\n",
        normalize_target(path),
        HTTP_VERSION,
        host,
        port
    );
    if let Some(since) = since {
        head.push_str("If-modified-since: ");
        head.push_str(since);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head
}
