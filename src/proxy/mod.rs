//! Proxy sessions.
//!
//! # Data Flow
//! ```text
//! client bytes
//!     → pending.rs (request line + headers → PendingRequest)
//!     → session.rs (key lock, freshness decision)
//!     → origin.rs (GET / conditional GET, status + headers)
//!     → cache store / verbatim relay
//!     → client
//! ```
//! error_pages.rs renders local failures.

pub mod error_pages;
pub mod origin;
pub mod pending;
pub mod session;

pub use error_pages::ErrorPages;
pub use origin::{OriginClient, OriginResponse, Revalidation};
pub use pending::PendingRequest;
pub use session::{serve, ProxyState, SessionSummary};
