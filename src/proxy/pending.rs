//! The parsed client request a session works on.

use chrono::{DateTime, Utc};

use crate::cache::CacheKey;
use crate::error::{ProxyError, ProxyResult};
use crate::http::{HeaderBlock, RequestLine};

/// Port assumed when the `Host` header carries none.
pub const DEFAULT_ORIGIN_PORT: u16 = 80;

/// One in-flight client-to-origin exchange.
///
/// Built once the request line and headers are read; dropped once the
/// response has been relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub method: String,
    pub target: String,
    pub host: String,
    pub port: u16,
    /// The client's own `If-modified-since`, if any.
    pub if_modified_since: Option<DateTime<Utc>>,
    pub request_id: String,
}

impl PendingRequest {
    /// Validate a request head and resolve its origin.
    ///
    /// Checks run in the order the client would notice them: method, then
    /// version, then `Host`.
    pub fn from_parts(
        line: RequestLine,
        headers: &HeaderBlock,
        request_id: String,
    ) -> ProxyResult<Self> {
        if !line.is_get() {
            return Err(ProxyError::MethodNotImplemented(line.method));
        }
        if !line.is_supported_version() {
            return Err(ProxyError::VersionNotSupported(line.version));
        }

        let host_header = headers
            .host
            .as_deref()
            .ok_or_else(|| ProxyError::BadRequest("missing Host header".to_string()))?;
        let (host, port) = parse_host(host_header)?;

        Ok(Self {
            method: line.method,
            target: line.target,
            host,
            port,
            if_modified_since: headers.if_modified_since,
            request_id,
        })
    }

    /// Cache key for this request's origin and path.
    pub fn cache_key(&self) -> ProxyResult<CacheKey> {
        CacheKey::new(&self.host, self.port, &self.target)
    }

    pub fn origin(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a `Host` value into name and port.
pub fn parse_host(value: &str) -> ProxyResult<(String, u16)> {
    let value = value.trim();
    let (host, port) = match value.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ProxyError::BadRequest(format!("invalid port in Host {:?}", value)))?;
            (host, port)
        }
        None => (value, DEFAULT_ORIGIN_PORT),
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(ProxyError::BadRequest(format!("invalid Host {:?}", value)));
    }
    Ok((host.to_string(), port))
}
