// [libs/core/persistence/src/lock_table.rs]
//! In-memory lock table keyed by entity id. Serialises all writes to a
//! single entity's checkpoint, preserving write ordering, and,
//! separately, all fingerprint writes for a single destination.
//!
//! Two independent tables rather than one: a forwarder job holds the
//! destination's fingerprint lock for the whole batch while the
//! archival pipeline concurrently holds a *different* entity's
//! checkpoint lock — they must not contend with each other.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
struct Registry {
    locks: HashMap<i64, Arc<Mutex<()>>>,
}

impl Registry {
    fn entry(&mut self, key: i64) -> Arc<Mutex<()>> {
        self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Keyed mutex table. Cloning is cheap (an `Arc` around the map) and
/// all clones share the same underlying locks.
#[derive(Clone, Default)]
pub struct KeyedLockTable {
    registry: Arc<std::sync::Mutex<Registry>>,
}

impl KeyedLockTable {
    pub fn new() -> Self {
        KeyedLockTable::default()
    }

    /// Acquires the lock for `key`, blocking other holders of the same
    /// key until the guard is dropped. Distinct keys never block each
    /// other.
    pub async fn lock(&self, key: i64) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut registry = self.registry.lock().expect("lock table mutex poisoned");
            registry.entry(key)
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let table = KeyedLockTable::new();
        let _g1 = table.lock(1).await;
        let g2 = table.lock(2).await;
        drop(g2);
    }

    #[tokio::test]
    async fn same_key_serialises() {
        let table = KeyedLockTable::new();
        let guard = table.lock(1).await;
        let table2 = table.clone();
        let handle = tokio::spawn(async move {
            let _g = table2.lock(1).await;
        });
        drop(guard);
        handle.await.unwrap();
    }
}
