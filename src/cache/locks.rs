//! Per-key in-flight guards.
//!
//! At most one session may consult, fetch and write a given key at a time.
//! Others asking for the same key wait for the guard; different keys never
//! contend. Lock entries are removed once nobody holds or awaits them.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map from cache path to the mutex serializing work on it.
#[derive(Debug, Default)]
pub struct KeyLocks {
    inner: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
    contended: AtomicU64,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Dropping the returned future while it waits still cleans up the
    /// map entry.
    pub async fn acquire(&self, key: PathBuf) -> KeyGuard {
        // Declared before the wait so its Drop runs after the lock future's.
        let mut held = KeyGuard {
            guard: None,
            map: Arc::clone(&self.inner),
            key,
        };

        let mutex = self
            .inner
            .entry(held.key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match Arc::clone(&mutex).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %held.key.display(), "Waiting for in-flight fetch of same key");
                mutex.lock_owned().await
            }
        };

        held.guard = Some(guard);
        held
    }

    /// Keys currently held or awaited.
    pub fn in_flight(&self) -> usize {
        self.inner.len()
    }

    /// How many acquisitions had to wait for another holder.
    pub fn contended_count(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }
}

/// Exclusive access to one key. Released on drop.
#[derive(Debug)]
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    map: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
    key: PathBuf,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still references the mutex: nobody holds or waits.
        self.map
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
