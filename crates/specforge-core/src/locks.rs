//! Per-key mutual exclusion for controller mutations.
//!
//! Each key (`discovery:<id>`, `project:<id>`, `prd:<id>`) gets its own
//! mutex, so unrelated entities never contend. Slots are dropped from the map
//! once no caller holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// Nested calls must take keys in a fixed order (project before entity);
    /// the same key must not be taken twice on one thread.
    pub fn with<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = acquire(&self.slots);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let out = {
            let _guard = acquire(&slot);
            f()
        };

        let mut slots = acquire(&self.slots);
        // Only the map and this handle remain: nobody else wants the key.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        out
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        acquire(&self.slots).len()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn acquire<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn discovery_key(id: &str) -> String {
    format!("discovery:{id}")
}

pub(crate) fn project_key(id: &str) -> String {
    format!("project:{id}")
}

pub(crate) fn prd_key(id: &str) -> String {
    format!("prd:{id}")
}
