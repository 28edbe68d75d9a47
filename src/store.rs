//! In-memory key-value store with a single exclusive lock
//!
//! All entries live in one `HashMap` guarded by one mutex. Each operation
//! takes the lock, performs its complete lookup/update, and drops it before
//! returning. The methods are synchronous, so callers cannot hold the lock
//! across an `.await`.

use crate::bounded::BoundedBytes;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Trait defining the interface for key-value storage operations
pub trait Store: Send + Sync {
    /// Create or overwrite the entry for `key`
    fn set(&self, key: BoundedBytes, value: BoundedBytes);

    /// Get the current value for `key`
    fn get(&self, key: &BoundedBytes) -> Option<BoundedBytes>;

    /// Remove the entry for `key`, returning whether one existed
    fn delete(&self, key: &BoundedBytes) -> bool;

    /// Get the number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe in-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<BoundedBytes, BoundedBytes>>,
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn set(&self, key: BoundedBytes, value: BoundedBytes) {
        // Replaces the value in place when the key already exists
        self.data.lock().insert(key, value);
    }

    fn get(&self, key: &BoundedBytes) -> Option<BoundedBytes> {
        self.data.lock().get(key).cloned()
    }

    fn delete(&self, key: &BoundedBytes) -> bool {
        self.data.lock().remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.data.lock().len()
    }
}
