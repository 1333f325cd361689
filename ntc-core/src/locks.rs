use dashmap::DashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{CoreError, CoreResult};

/// Exclusive sections keyed by an id (one per bus), each acquired with a
/// bounded wait. Slots are created lazily and live as long as the map.
pub struct KeyedLocks<K> {
    slots: DashMap<K, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Ord + Clone + Display,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            timeout,
        }
    }

    fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        Arc::clone(&self.slots.entry(key.clone()).or_default())
    }

    /// Waits at most `timeout` for the section, then gives up with `Busy`.
    pub async fn acquire(&self, key: &K) -> CoreResult<OwnedMutexGuard<()>> {
        let slot = self.slot(key);
        tokio::time::timeout(self.timeout, slot.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!("Timed out waiting for lock on {}", key);
                CoreError::Busy(format!("timed out waiting for lock on {}", key))
            })
    }

    /// Acquires several sections in ascending key order so two callers
    /// holding overlapping key sets can never deadlock. Duplicates are
    /// collapsed. Guards already taken are released if a later one times out.
    pub async fn acquire_all(&self, keys: &[K]) -> CoreResult<Vec<OwnedMutexGuard<()>>> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in &ordered {
            guards.push(self.acquire(key).await?);
        }
        Ok(guards)
    }
}
