//! Gap analysis (§4.7): minute-bucketed event counts, walked in order to
//! emit silent `gaps` and contiguous-activity `sessions` covering the full
//! range.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;
use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub start: String,
    pub end: String,
    pub event_count: i64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct GapAnalysis {
    pub gaps: Vec<Gap>,
    pub sessions: Vec<Session>,
}

fn minute_buckets(tab: &Tab, filter: &FilterModel, column: &str) -> AnalyticsResult<Vec<(String, i64)>> {
    let bucket_expr = format!("extract_datetime_minute({column})");
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
        .query_map(bind_params(&compiled.params).as_slice(), |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Same bucketing as [`minute_buckets`], projected to `(minute-since-epoch,
/// count)` pairs sorted ascending — the shape burst analysis windows over.
pub(crate) fn minute_buckets_with_ts(tab: &Tab, filter: &FilterModel, column: &str) -> AnalyticsResult<Vec<(i64, i64)>> {
    let mut pairs: Vec<(i64, i64)> = minute_buckets(tab, filter, column)?
        .into_iter()
        .filter_map(|(bucket, count)| minutes_since_epoch(&bucket).map(|ts| (ts, count)))
        .collect();
    pairs.sort_by_key(|(ts, _)| *ts);
    Ok(pairs)
}

fn minutes_since_epoch(bucket: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(bucket, "%Y-%m-%d %H:%M")
        .ok()
        .map(|dt| dt.and_utc().timestamp() / 60)
}

/// Walks minute buckets in order; a gap is declared when the distance
/// between two adjacent buckets exceeds `threshold_minutes`.
pub fn gap_analysis(
    tab: &Tab,
    filter: &FilterModel,
    column: &str,
    threshold_minutes: i64,
) -> AnalyticsResult<GapAnalysis> {
    let buckets = minute_buckets(tab, filter, column)?;
    let mut result = GapAnalysis::default();

    let mut iter = buckets
        .into_iter()
        .filter_map(|(bucket, count)| minutes_since_epoch(&bucket).map(|ts| (bucket, ts, count)));

    let Some((first_bucket, first_ts, first_count)) = iter.next() else {
        return Ok(result);
    };

    let mut session_start = first_bucket.clone();
    let mut session_start_ts = first_ts;
    let mut session_end = first_bucket;
    let mut session_end_ts = first_ts;
    let mut session_count = first_count;

    for (bucket, ts, count) in iter {
        let gap_minutes = ts - session_end_ts;
        if gap_minutes > threshold_minutes {
            result.sessions.push(Session {
                start: session_start.clone(),
                end: session_end.clone(),
                event_count: session_count,
                duration_minutes: session_end_ts - session_start_ts,
            });
            result.gaps.push(Gap {
                start: session_end.clone(),
                end: bucket.clone(),
                duration_minutes: gap_minutes,
            });
            session_start = bucket.clone();
            session_start_ts = ts;
            session_count = count;
        } else {
            session_count += count;
        }
        session_end = bucket;
        session_end_ts = ts;
    }

    result.sessions.push(Session {
        start: session_start,
        end: session_end,
        event_count: session_count,
        duration_minutes: session_end_ts - session_start_ts,
    });

    Ok(result)
}
