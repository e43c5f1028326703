//! Per-user logical lock (spec §5 Scheduling model). All user-state
//! mutations are serialized behind one lock per user — a `tokio::Mutex` in
//! this single-process deployment, standing in for the lease/row-lock a
//! persisted deployment would use instead.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `user_id`, creating it on first use. Concurrent
    /// callers for different users never block each other.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
