use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Per-user mutual exclusion for cart read-modify-write.
///
/// Every cart mutation (and checkout) holds the owner's guard from the first
/// read until the commit, so concurrent adds for one user are applied one
/// after another instead of overwriting each other. Different users never
/// share a lock. An entry lives only while someone holds or waits on it.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<LockMap>,
}

/// Held for the duration of one cart mutation.
pub struct UserLockGuard {
    user_id: Uuid,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: Uuid) -> UserLockGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self.inner.entry(user_id).or_default().value().clone();
        let guard = lock.lock_owned().await;
        UserLockGuard {
            user_id,
            locks: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds the last reference once no task holds or awaits the
        // mutex. `entry` takes the same shard lock, so no waiter can appear
        // between the check and the removal.
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
