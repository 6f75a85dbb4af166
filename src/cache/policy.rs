//! Freshness policy.
//!
//! # States
//! - Miss: no entry; fetch unconditionally
//! - Fresh: entry younger than the window; revalidate with a conditional GET
//! - Expired: entry at least as old as the window; delete and refetch
//!
//! Young entries are revalidated and old ones are refetched without asking
//! the origin, the inverse of the usual expire-then-revalidate scheme.

use std::time::{Duration, SystemTime};

/// Default freshness window.
pub const DEFAULT_EXPIRE_SECS: u64 = 120;

/// What the session should do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No cache entry.
    Miss,
    /// Entry exists and is younger than the window.
    FreshPendingRevalidation { modified: SystemTime },
    /// Entry exists and is at least as old as the window.
    Expired { age: Duration },
}

impl Freshness {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Freshness::Miss => "miss",
            Freshness::FreshPendingRevalidation { .. } => "revalidate",
            Freshness::Expired { .. } => "expired",
        }
    }
}

/// Classifies cache entries by age.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    expire_after: Duration,
}

impl FreshnessPolicy {
    pub fn new(expire_after: Duration) -> Self {
        Self { expire_after }
    }

    pub fn expire_after(&self) -> Duration {
        self.expire_after
    }

    /// Decide based on the entry's modification time (`None` = no entry).
    ///
    /// A modification time in the future counts as age zero.
    pub fn classify(&self, modified: Option<SystemTime>, now: SystemTime) -> Freshness {
        let Some(modified) = modified else {
            return Freshness::Miss;
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < self.expire_after {
            Freshness::FreshPendingRevalidation { modified }
        } else {
            Freshness::Expired { age }
        }
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_EXPIRE_SECS))
    }
}
