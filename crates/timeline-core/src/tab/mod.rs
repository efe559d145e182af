//! Tab: the unit of isolated storage for one imported file (or one merged
//! timeline). Owns exactly one embedded relational store, the original
//! column headers in insertion order, a header-to-safe-identifier mapping,
//! and the derived timestamp/numeric column sets (§3).

mod headers;
mod registry;

pub use headers::{is_timestamp_header, sanitize_headers, HeaderMap};
pub use registry::TabRegistry;

use crate::error::StorageResult;
use crate::storage::store::TabStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// Opaque identifier for a tab. Stable for the tab's lifetime; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TabId(pub Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tab: identity, header mapping, derived column classification, and the
/// backing store. Mutation methods (bookmark/tag toggles) are no-ops while
/// a background build is running (§4.1 invariant) — callers poll
/// [`Tab::is_ready`] first.
pub struct Tab {
    pub id: TabId,
    pub name: String,
    pub headers: HeaderMap,
    pub store: TabStore,
    /// Safe-identifier columns recognized as timestamp-like by header name.
    pub timestamp_columns: RwLock<Vec<String>>,
    /// Safe-identifier columns classified numeric after finalize sampling.
    pub numeric_columns: RwLock<Vec<String>>,
    building: AtomicBool,
    fts_ready: AtomicBool,
}

impl Tab {
    pub fn new(name: String, original_headers: Vec<String>) -> StorageResult<Self> {
        let headers = HeaderMap::new(original_headers);
        let store = TabStore::create(&headers)?;
        let timestamp_columns = headers
            .safe_columns()
            .iter()
            .zip(headers.original_headers())
            .filter(|(_, original)| is_timestamp_header(original))
            .map(|(safe, _)| safe.clone())
            .collect();
        Ok(Self {
            id: TabId::new(),
            name,
            headers,
            store,
            timestamp_columns: RwLock::new(timestamp_columns),
            numeric_columns: RwLock::new(Vec::new()),
            building: AtomicBool::new(false),
            fts_ready: AtomicBool::new(false),
        })
    }

    /// True when neither the sort-index build nor the FTS build is
    /// currently in flight; mutation methods should check this first.
    pub fn is_ready_for_mutation(&self) -> bool {
        !self.building.load(Ordering::SeqCst)
    }

    pub fn set_building(&self, building: bool) {
        self.building.store(building, Ordering::SeqCst);
    }

    pub fn fts_ready(&self) -> bool {
        self.fts_ready.load(Ordering::SeqCst)
    }

    pub fn set_fts_ready(&self, ready: bool) {
        self.fts_ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_timestamp_column(&self, safe_col: &str) -> bool {
        self.timestamp_columns.read().unwrap().iter().any(|c| c == safe_col)
    }

    pub fn is_numeric_column(&self, safe_col: &str) -> bool {
        self.numeric_columns.read().unwrap().iter().any(|c| c == safe_col)
    }

    pub fn set_numeric_columns(&self, cols: Vec<String>) {
        *self.numeric_columns.write().unwrap() = cols;
    }

    /// Toggles a bookmark, no-op (returning the current state) while a
    /// background build is in flight (§4.1 invariant).
    pub fn toggle_bookmark(&self, row_id: i64) -> StorageResult<bool> {
        if !self.is_ready_for_mutation() {
            return self.store.is_bookmarked(row_id);
        }
        self.store.toggle_bookmark(row_id)
    }

    /// Bulk-bookmarks, no-op while a background build is in flight.
    pub fn set_bookmarks(&self, row_ids: &[i64]) -> StorageResult<()> {
        if !self.is_ready_for_mutation() {
            return Ok(());
        }
        self.store.set_bookmarks(row_ids)
    }

    /// Adds a tag, no-op while a background build is in flight.
    pub fn add_tag(&self, row_id: i64, label: &str) -> StorageResult<()> {
        if !self.is_ready_for_mutation() {
            return Ok(());
        }
        self.store.add_tag(row_id, label)
    }

    /// Removes a tag, no-op while a background build is in flight.
    pub fn remove_tag(&self, row_id: i64, label: &str) -> StorageResult<()> {
        if !self.is_ready_for_mutation() {
            return Ok(());
        }
        self.store.remove_tag(row_id, label)
    }
}
