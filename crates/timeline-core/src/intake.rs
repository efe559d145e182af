//! File-to-tab import orchestration: the glue between [`parsers::open`],
//! [`Tab::new`], and the [`Scheduler`]'s `import_fn` closure. A single file
//! import is synchronous end to end; the scheduler is what makes many of
//! them behave like a queue.

use crate::config::TimelineConfig;
use crate::error::Result;
use crate::scheduler::ImportOutcome;
use crate::tab::{Tab, TabId, TabRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One file queued for import. `sheet_name` only matters for spreadsheets
/// with more than one sheet.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub name: String,
    pub path: PathBuf,
    pub sheet_name: Option<String>,
}

/// Opens `request.path`, creates its tab, and registers it — but does not
/// stream any rows yet. Returns the tab id so the caller can enqueue it on
/// a [`crate::scheduler::Scheduler`] before the import itself runs.
pub fn stage(registry: &Arc<TabRegistry>, request: &IntakeRequest) -> Result<TabId> {
    let parser = crate::parsers::open(&request.path, request.sheet_name.as_deref())?;
    let tab = Tab::new(request.name.clone(), parser.headers().to_vec())?;
    let tab_id = tab.id;
    registry.insert(tab);
    Ok(tab_id)
}

/// Runs the actual import for a staged tab: re-opens the source file,
/// streams batches into the tab's store, and finalizes column
/// classification. Meant to be called from inside a [`Scheduler::drain`]
/// closure, one tab at a time.
pub async fn import_one(registry: &Arc<TabRegistry>, config: &TimelineConfig, tab_id: TabId, path: &Path, sheet_name: Option<&str>) -> ImportOutcome {
    match import_one_inner(registry, config, tab_id, path, sheet_name).await {
        Ok(()) => ImportOutcome::Succeeded,
        Err(err) => ImportOutcome::Failed(err.to_string()),
    }
}

async fn import_one_inner(
    registry: &Arc<TabRegistry>,
    config: &TimelineConfig,
    tab_id: TabId,
    path: &Path,
    sheet_name: Option<&str>,
) -> Result<()> {
    let tab = registry.get(tab_id)?;
    let mut parser = crate::parsers::open(path, sheet_name)?;

    loop {
        let batch = parser.next_batch(config.parser_batch_rows)?;
        let Some(batch) = batch else { break };
        if batch.is_empty() {
            break;
        }
        tab.store.insert_batch(&batch)?;
        tokio::task::yield_now().await;
    }

    let timestamp_cols = tab.timestamp_columns.read().unwrap().clone();
    let numeric_columns = tab.store.finalize(config.column_sample_rows, config.numeric_classification_threshold, &timestamp_cols)?;
    tab.set_numeric_columns(numeric_columns);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::io::Write;

    #[tokio::test]
    async fn stage_then_import_populates_tab() {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "datetime,message").unwrap();
        writeln!(file, "2024-01-01 00:00:00,hello").unwrap();
        file.flush().unwrap();

        let registry = Arc::new(TabRegistry::new());
        let config = TimelineConfig::default();
        let request = IntakeRequest {
            name: "events".into(),
            path: file.path().to_path_buf(),
            sheet_name: None,
        };

        let tab_id = stage(&registry, &request).unwrap();
        let scheduler = Scheduler::new(registry.clone(), config.clone());
        scheduler.enqueue_import(tab_id);

        let path = request.path.clone();
        scheduler
            .drain(|id| {
                let registry = registry.clone();
                let config = config.clone();
                let path = path.clone();
                async move { import_one(&registry, &config, id, &path, None).await }
            })
            .await;

        let tab = registry.get(tab_id).unwrap();
        assert_eq!(tab.store.row_count().unwrap(), 1);
    }
}
