// Per-title write locks
// Serializes save/delete of the same page; other titles are never blocked

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily created async mutex per title
#[derive(Default)]
pub struct TitleLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TitleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `title`
    pub async fn acquire(&self, title: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds so the map tracks only live writers
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(title.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of titles with a tracked lock
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
