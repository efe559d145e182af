//! Process-wide tab registry (§9 "Globally mutable state → per-process
//! registry"). Guarded by a single mutex; exposed only through
//! message-style operations so callers — the scheduler in particular — can
//! serialize per-tab work instead of reaching into shared state directly.

use super::{Tab, TabId};
use crate::error::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct TabRegistry {
    tabs: Mutex<HashMap<TabId, Arc<Tab>>>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tab: Tab) -> Arc<Tab> {
        let tab = Arc::new(tab);
        self.tabs.lock().unwrap().insert(tab.id, tab.clone());
        tab
    }

    pub fn get(&self, id: TabId) -> StorageResult<Arc<Tab>> {
        self.tabs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::TabNotFound(id.to_string()))
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.lock().unwrap().contains_key(&id)
    }

    /// Removes a tab and runs its teardown (optimize, close, delete backing
    /// files). No error from teardown is fatal — matching §4.1's "no error
    /// is fatal" close contract.
    pub fn close(&self, id: TabId) -> StorageResult<()> {
        let tab = self.tabs.lock().unwrap().remove(&id);
        if let Some(tab) = tab {
            if let Err(e) = tab.store.close() {
                tracing::warn!(tab = %id, error = %e, "error while closing tab store, continuing");
            }
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<TabId> {
        self.tabs.lock().unwrap().keys().copied().collect()
    }
}
