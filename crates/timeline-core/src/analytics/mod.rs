//! Specialized forensic analytics (§4.7): histogram, gap/burst detection,
//! log-source coverage, value stacking, and IOC matching. Every analytic
//! runs against the current filter's result set, never the whole tab.

pub mod bursts;
pub mod coverage;
pub mod gaps;
pub mod histogram;
pub mod ioc;
pub mod stacking;

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;

/// Runs `projection` (a SQL expression over the filtered row set, typically
/// one of the registered temporal functions) and returns one string per
/// matching row, in no particular order; NULL projections are dropped.
fn project_column(tab: &Tab, filter: &FilterModel, projection: &str) -> AnalyticsResult<Vec<String>> {
    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let sql = format!("SELECT {projection} FROM rows{where_sql}");
    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let values = stmt
        .query_map(bind_params(&compiled.params).as_slice(), |r| r.get::<_, Option<String>>(0))?
        .filter_map(|r| r.ok().flatten())
        .collect();
    Ok(values)
}
