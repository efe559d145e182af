//! Log-source coverage (§4.7): per-source event count and timestamp range,
//! plus the global range across all sources. `sort_datetime` makes `MIN`/
//! `MAX` chronologically correct regardless of the source column's native
//! string format.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SourceCoverage {
    pub source: String,
    pub event_count: i64,
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub sources: Vec<SourceCoverage>,
    pub global_earliest: Option<String>,
    pub global_latest: Option<String>,
}

pub fn log_source_coverage(
    tab: &Tab,
    filter: &FilterModel,
    source_column: &str,
    timestamp_column: &str,
) -> AnalyticsResult<CoverageReport> {
    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let sql = format!(
        "SELECT {source_column}, COUNT(*), MIN(sort_datetime({timestamp_column})), MAX(sort_datetime({timestamp_column})) \
         FROM rows{where_sql} GROUP BY {source_column} ORDER BY {source_column}"
    );

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let sources: Vec<SourceCoverage> = stmt
        .query_map(bind_params(&compiled.params).as_slice(), |r| {
            Ok(SourceCoverage {
                source: r.get::<_, Option<String>>(0)?.unwrap_or_default(),
                event_count: r.get(1)?,
                earliest: r.get(2)?,
                latest: r.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    let global_earliest = sources.iter().filter_map(|s| s.earliest.clone()).min();
    let global_latest = sources.iter().filter_map(|s| s.latest.clone()).max();

    Ok(CoverageReport { sources, global_earliest, global_latest })
}
