//! Persistent response cache.
//!
//! # Data Flow
//! ```text
//! (host, port, target)
//!     → key.rs (CacheKey, on-disk layout)
//!     → locks.rs (one in-flight session per key)
//!     → store.rs (exists / mtime / write / remove)
//!     → policy.rs (Miss | Fresh | Expired from the entry's mtime)
//! ```

pub mod key;
pub mod locks;
pub mod policy;
pub mod store;

pub use key::CacheKey;
pub use locks::{KeyGuard, KeyLocks};
pub use policy::{Freshness, FreshnessPolicy};
pub use store::{CacheStore, StoredBody};
