//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Origin exchange:
//!     → timeouts.rs (connect / read deadlines)
//!     → On connect failure: retries.rs (retry with backoff.rs delays)
//!     → Exhausted: 502 / 504 to the client
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every origin call has a deadline
//! - Only connects are retried; a written request is never replayed

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::retry;
pub use timeouts::with_timeout;
