//! Histogram (§4.7): `(bucket label, count)` over a timestamp column,
//! bucketed by day (`extract_date`) or hour (first 13 characters of
//! `extract_datetime_minute`), sorted ascending by bucket.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Hour,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    pub bucket: String,
    pub count: i64,
}

pub fn histogram(
    tab: &Tab,
    filter: &FilterModel,
    column: &str,
    granularity: Granularity,
) -> AnalyticsResult<Vec<HistogramBucket>> {
    let bucket_expr = match granularity {
        Granularity::Day => format!("extract_date({column})"),
        Granularity::Hour => format!("substr(extract_datetime_minute({column}), 1, 13)"),
    };

    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        format!("{bucket_expr} IS NOT NULL")
    } else {
        format!("({}) AND {bucket_expr} IS NOT NULL", compiled.where_clause)
    };
    let sql = format!(
        "SELECT {bucket_expr} AS bucket, COUNT(*) AS cnt FROM rows WHERE {where_sql} GROUP BY bucket ORDER BY bucket ASC"
    );

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let rows = stmt
        .query_map(bind_params(&compiled.params).as_slice(), |r| {
            Ok(HistogramBucket { bucket: r.get(0)?, count: r.get(1)? })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
