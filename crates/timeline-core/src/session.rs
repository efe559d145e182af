//! Session persistence (§6 "Session file"): round-trip a JSON description
//! of open tabs, then re-import each source file independently on restore.
//! A moved or deleted source file fails only its own tab — the rest of the
//! session still restores (see the design ledger for why this is a
//! deliberate choice on an ambiguous point of the source description).

use crate::config::TimelineConfig;
use crate::filter::FilterModel;
use crate::tab::{Tab, TabId, TabRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const SESSION_VERSION: u32 = 1;

/// Persisted with sessions but never evaluated by the core; the caller's
/// presentation layer owns color-rule semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorRule {
    pub column: String,
    pub condition: String,
    pub value: String,
    pub background_color: String,
    pub foreground_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTab {
    pub name: String,
    pub file_path: PathBuf,
    pub sheet_name: Option<String>,
    pub columns: Vec<String>,
    pub filters: FilterModel,
    pub bookmarks: Vec<i64>,
    pub tags: HashMap<i64, Vec<String>>,
    pub color_rules: Vec<ColorRule>,
    pub group_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub version: u32,
    pub tabs: Vec<SessionTab>,
    pub active_tab: Option<usize>,
}

pub fn save(path: &Path, session: &SessionFile) -> crate::error::Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load(path: &Path) -> crate::error::Result<SessionFile> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[derive(Debug)]
pub struct RestoredTab {
    pub session_index: usize,
    pub tab_id: TabId,
}

#[derive(Debug)]
pub struct RestoreFailure {
    pub session_index: usize,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<RestoredTab>,
    pub failed: Vec<RestoreFailure>,
}

/// Re-imports every tab's source file independently; a missing or
/// unreadable file is recorded as a per-tab failure rather than aborting
/// the whole restore.
pub fn restore(registry: &TabRegistry, config: &TimelineConfig, session: &SessionFile) -> RestoreReport {
    let mut report = RestoreReport::default();

    for (index, tab_record) in session.tabs.iter().enumerate() {
        match restore_one(registry, config, tab_record) {
            Ok(tab_id) => report.restored.push(RestoredTab { session_index: index, tab_id }),
            Err(err) => report.failed.push(RestoreFailure {
                session_index: index,
                name: tab_record.name.clone(),
                error: err.to_string(),
            }),
        }
    }

    report
}

fn restore_one(registry: &TabRegistry, config: &TimelineConfig, record: &SessionTab) -> crate::error::Result<TabId> {
    let mut parser = crate::parsers::open(&record.file_path, record.sheet_name.as_deref())?;
    let headers = parser.headers().to_vec();
    let tab = Tab::new(record.name.clone(), headers)?;

    while let Some(batch) = parser.next_batch(config.parser_batch_rows)? {
        tab.store.insert_batch(&batch)?;
    }

    let timestamp_cols = tab.timestamp_columns.read().unwrap().clone();
    let numeric_columns = tab.store.finalize(config.column_sample_rows, config.numeric_classification_threshold, &timestamp_cols)?;
    tab.set_numeric_columns(numeric_columns);

    tab.set_bookmarks(&record.bookmarks)?;
    for (row_id, labels) in &record.tags {
        for label in labels {
            tab.add_tag(*row_id, label)?;
        }
    }

    let tab_id = tab.id;
    registry.insert(tab);
    Ok(tab_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let session = SessionFile {
            version: SESSION_VERSION,
            tabs: vec![SessionTab {
                name: "events".into(),
                file_path: PathBuf::from("/tmp/events.csv"),
                sheet_name: None,
                columns: vec!["datetime".into(), "message".into()],
                filters: FilterModel::default(),
                bookmarks: vec![1, 2, 3],
                tags: HashMap::from([(1, vec!["suspicious".to_string()])]),
                color_rules: vec![],
                group_by: vec![],
            }],
            active_tab: Some(0),
        };

        let json = serde_json::to_string(&session).unwrap();
        let parsed: SessionFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tabs.len(), 1);
        assert_eq!(parsed.tabs[0].bookmarks, vec![1, 2, 3]);
    }
}
