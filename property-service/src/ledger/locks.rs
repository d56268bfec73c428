use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutex per property id.
///
/// Holding a [`PropertyGuard`] across "read latest balance, append event"
/// keeps two concurrent writers for the same property from both building on
/// the same prior balance. Entries are dropped once no one holds or waits on
/// them.
#[derive(Debug, Default)]
pub struct PropertyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

pub struct PropertyGuard<'a> {
    locks: &'a PropertyLocks,
    property_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PropertyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, property_id: &str) -> PropertyGuard<'_> {
        let mutex = self
            .locks
            .entry(property_id.to_string())
            .or_default()
            .clone();
        let guard = mutex.lock_owned().await;

        PropertyGuard {
            locks: self,
            property_id: property_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of properties with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for PropertyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits.
        self.locks
            .locks
            .remove_if(&self.property_id, |_, m| Arc::strong_count(m) == 1);
    }
}
