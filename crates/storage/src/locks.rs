use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::repository::StorageError;

/// One async lock per key, so work on different topics never waits on
/// each other while work on the same topic is serialized.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`; released when the guard drops.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the slot table is poisoned.
    pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>, StorageError> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            Arc::clone(slots.entry(key.to_owned()).or_default())
        };
        Ok(slot.lock_owned().await)
    }
}
