//! Tab merge (§4.12): project a set of source tabs into a single new tab
//! whose headers are `_Source, datetime, <sorted union of other headers>`.
//! The merge is a one-way projection; source tabs are never mutated.

use crate::config::TimelineConfig;
use crate::error::{Result, StorageResult};
use crate::storage::store::RowBatch;
use crate::tab::{Tab, TabId, TabRegistry};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One input to a merge: the tab to read from, the display name recorded
/// in `_Source`, and which of its columns supplies the `datetime` value.
pub struct MergeSource {
    pub tab_id: TabId,
    pub display_name: String,
    pub timestamp_column: String,
}

#[derive(Debug, Clone)]
pub enum MergeProgress {
    SourceStarted { display_name: String, index: usize, total: usize },
    SourceCompleted { display_name: String, rows_written: i64 },
    Finalizing,
    Complete { tab_id: TabId },
}

fn merged_headers(sources: &[(Arc<Tab>, &MergeSource)]) -> Vec<String> {
    let mut union: BTreeSet<String> = BTreeSet::new();
    for (tab, source) in sources {
        for header in tab.headers.original_headers() {
            if header != &source.timestamp_column {
                union.insert(header.clone());
            }
        }
    }
    let mut headers = vec!["_Source".to_string(), "datetime".to_string()];
    headers.extend(union);
    headers
}

fn project_source(
    source_tab: &Tab,
    merged_tab: &Tab,
    select_list: &[String],
    display_name: &str,
    batch_rows: usize,
) -> StorageResult<i64> {
    let reader = source_tab.store.reader();
    let sql = format!("SELECT {} FROM rows ORDER BY id", select_list.join(", "));
    let mut stmt = reader.prepare(&sql)?;
    let n = select_list.len();
    let mut rows = stmt.query([])?;

    let mut batch: RowBatch = Vec::with_capacity(batch_rows);
    let mut rows_written: i64 = 0;
    while let Some(row) = rows.next()? {
        let mut projected: Vec<Option<String>> = Vec::with_capacity(n + 1);
        projected.push(Some(display_name.to_string()));
        for i in 0..n {
            projected.push(row.get::<_, Option<String>>(i)?);
        }
        batch.push(projected);
        if batch.len() >= batch_rows {
            rows_written += batch.len() as i64;
            merged_tab.store.insert_batch(&batch)?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        rows_written += batch.len() as i64;
        merged_tab.store.insert_batch(&batch)?;
    }

    Ok(rows_written)
}

pub fn merge_tabs(
    registry: &TabRegistry,
    config: &TimelineConfig,
    name: String,
    sources: &[MergeSource],
    mut progress: impl FnMut(MergeProgress),
) -> Result<TabId> {
    let resolved: Vec<(Arc<Tab>, &MergeSource)> = sources
        .iter()
        .map(|source| Ok((registry.get(source.tab_id)?, source)))
        .collect::<Result<Vec<_>>>()?;

    let headers = merged_headers(&resolved);
    let merged_tab = Tab::new(name, headers.clone())?;
    let merged_headers = merged_tab.headers.clone();

    for (index, (source_tab, source)) in resolved.iter().enumerate() {
        progress(MergeProgress::SourceStarted {
            display_name: source.display_name.clone(),
            index,
            total: resolved.len(),
        });

        let datetime_select = source_tab
            .headers
            .safe_for(&source.timestamp_column)
            .map(str::to_string)
            .unwrap_or_else(|| "NULL".to_string());
        let select_list: Vec<String> = std::iter::once(datetime_select)
            .chain(
                merged_headers
                    .original_headers()
                    .iter()
                    .skip(2)
                    .map(|h| source_tab.headers.safe_for(h).map(str::to_string).unwrap_or_else(|| "''".to_string())),
            )
            .collect();

        let rows_written = project_source(source_tab, &merged_tab, &select_list, &source.display_name, config.merge_batch_rows)?;

        progress(MergeProgress::SourceCompleted { display_name: source.display_name.clone(), rows_written });
    }

    progress(MergeProgress::Finalizing);
    let timestamp_cols = merged_tab.timestamp_columns.read().unwrap().clone();
    let numeric_columns = merged_tab.store.finalize(
        config.column_sample_rows,
        config.numeric_classification_threshold,
        &timestamp_cols,
    )?;
    merged_tab.set_numeric_columns(numeric_columns);

    if let Some(datetime_col) = merged_headers.safe_for("datetime") {
        merged_tab.store.ensure_sort_index(datetime_col)?;
    }
    if let Some(source_col) = merged_headers.safe_for("_Source") {
        merged_tab.store.ensure_sort_index(source_col)?;
    }

    let tab_id = merged_tab.id;
    registry.insert(merged_tab);
    progress(MergeProgress::Complete { tab_id });

    Ok(tab_id)
}
