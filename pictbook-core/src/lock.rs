use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry handing out one mutex per opaque string key, so concurrent
/// builds of the same cache file serialize while unrelated builds run in
/// parallel.
///
/// Exclusion is based on logical string equality, never on pointer
/// identity: two independently constructed strings with the same content
/// map to the same mutex. Entries are created on demand and retained for
/// the process lifetime; the key space is bounded by the distinct
/// (file, size) pairs actually requested.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block (asynchronously) until the lock for `key` is free and take it.
    /// Acquisition cannot fail; the guard releases on drop.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.locks.len()
    }
}
