use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Synchronization token for one (project, instance) pair. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceLockKey(String);

impl InstanceLockKey {
    pub fn new(project: &str, instance: &str) -> Self {
        Self(format!(
            "google-sql-database-instance-{}-{}",
            project, instance
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceLockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed mutual-exclusion registry.
///
/// Acquisitions with equal keys serialize; different keys never block each
/// other. There is no acquisition timeout and no deadlock detection: the
/// holder must bound its own critical section. Create one per process and
/// share it by `Arc`.
#[derive(Default)]
pub struct InstanceLockManager {
    locks: DashMap<InstanceLockKey, Arc<Mutex<()>>>,
}

/// Held lock. Released when dropped, on every exit path.
#[derive(Debug)]
pub struct InstanceLockGuard {
    key: InstanceLockKey,
    _guard: OwnedMutexGuard<()>,
}

impl InstanceLockGuard {
    pub fn key(&self) -> &InstanceLockKey {
        &self.key
    }
}

impl Drop for InstanceLockGuard {
    fn drop(&mut self) {
        tracing::debug!(key = self.key.as_str(), "Released instance lock");
    }
}

impl InstanceLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the lock for `key` is free and take it.
    pub async fn acquire(&self, key: InstanceLockKey) -> InstanceLockGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        tracing::debug!(key = key.as_str(), "Waiting for instance lock");
        let guard = mutex.lock_owned().await;
        tracing::debug!(key = key.as_str(), "Acquired instance lock");

        InstanceLockGuard { key, _guard: guard }
    }

    /// Release a held lock explicitly. Equivalent to dropping the guard.
    pub fn release(&self, guard: InstanceLockGuard) {
        drop(guard);
    }

    /// Whether the lock for `key` is currently held.
    pub fn is_locked(&self, key: &InstanceLockKey) -> bool {
        self.locks
            .get(key)
            .map(|m| m.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of keys ever registered.
    pub fn registered_keys(&self) -> usize {
        self.locks.len()
    }
}
