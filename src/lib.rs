//! Filesystem-backed HTTP/1.1 caching proxy.
//!
//! A client's GET is answered from a persistent cache keyed by origin and
//! path, revalidated against the origin while young, refetched once old.

// Wire protocol and server
pub mod http;
pub mod net;
pub mod proxy;

// Storage
pub mod cache;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
