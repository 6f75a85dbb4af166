//! Cache keys.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ProxyError, ProxyResult};
use crate::http::request::{leaf_name, normalize_target};

/// Identifies one cached resource: origin host, origin port and URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    host: String,
    port: u16,
    path: String,
}

impl CacheKey {
    /// Build a key from a request target.
    ///
    /// The target is normalized by stripping leading `/`. Empty paths and
    /// paths that could escape the origin directory are rejected.
    pub fn new(host: &str, port: u16, target: &str) -> ProxyResult<Self> {
        let path = normalize_target(target);
        if path.is_empty() || path.ends_with('/') {
            return Err(ProxyError::BadRequest(format!("no file named in {:?}", target)));
        }
        if host.is_empty() || host.contains(['/', '\\']) || host.starts_with('.') {
            return Err(ProxyError::BadRequest(format!("invalid host {:?}", host)));
        }
        let escapes = path
            .split('/')
            .any(|segment| matches!(segment, "" | "." | "..") || segment.contains('\\'));
        if escapes {
            return Err(ProxyError::BadRequest(format!("invalid path {:?}", target)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Normalized path, without leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment; decides the served content type.
    pub fn leaf_name(&self) -> &str {
        leaf_name(&self.path)
    }

    /// Location below the cache root: `<host>_<port>/<path>`.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&format!("{}_{}", self.host, self.port)).join(&self.path)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.path)
    }
}
