//! IOC match (§4.7): two phases. First, patterns are batched into
//! alternation regexes and tested via the registered `REGEXP` function to
//! find every matching row identifier. Second, matched rows are paged back
//! in and checked per original pattern (case-insensitive, in process) to
//! produce per-pattern hit counts — including zero for patterns that
//! matched nothing, since the row set is already known to contain at least
//! one hit from *some* pattern in its batch.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize)]
pub struct IocMatchResult {
    pub matched_row_ids: Vec<i64>,
    pub pattern_counts: HashMap<String, i64>,
}

fn find_matched_ids(
    tab: &Tab,
    base_where: &str,
    base_params: &[Value],
    columns: &[String],
    patterns: &[String],
    pattern_batch: usize,
) -> AnalyticsResult<BTreeSet<i64>> {
    let mut matched = BTreeSet::new();
    let reader = tab.store.reader();

    for batch in patterns.chunks(pattern_batch) {
        let alternation = batch
            .iter()
            .map(|p| format!("(?:{p})"))
            .collect::<Vec<_>>()
            .join("|");

        let col_match = columns
            .iter()
            .map(|c| format!("{c} REGEXP ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let where_sql = if base_where.is_empty() {
            format!("({col_match})")
        } else {
            format!("({base_where}) AND ({col_match})")
        };
        let sql = format!("SELECT id FROM rows WHERE {where_sql}");

        let mut params: Vec<Value> = base_params.to_vec();
        params.extend(std::iter::repeat(Value::Text(alternation.clone())).take(columns.len()));

        let mut stmt = reader.prepare(&sql)?;
        let ids = stmt.query_map(bind_params(&params).as_slice(), |r| r.get::<_, i64>(0))?;
        for id in ids.filter_map(|r| r.ok()) {
            matched.insert(id);
        }
    }

    Ok(matched)
}

fn count_hits(
    tab: &Tab,
    matched_ids: &[i64],
    columns: &[String],
    patterns: &[String],
    page_rows: usize,
) -> AnalyticsResult<HashMap<String, i64>> {
    let compiled: Vec<(String, Option<regex::Regex>)> = patterns
        .iter()
        .map(|p| {
            let re = regex::RegexBuilder::new(p).case_insensitive(true).build().ok();
            if re.is_none() {
                tracing::warn!(pattern = %p, "invalid IOC regex, pattern will count zero hits");
            }
            (p.clone(), re)
        })
        .collect();

    let mut counts: HashMap<String, i64> = patterns.iter().map(|p| (p.clone(), 0)).collect();
    if matched_ids.is_empty() {
        return Ok(counts);
    }

    let reader = tab.store.reader();
    let col_list = columns.join(", ");

    for page in matched_ids.chunks(page_rows) {
        let placeholders = vec!["?"; page.len()].join(", ");
        let sql = format!("SELECT {col_list} FROM rows WHERE id IN ({placeholders})");
        let mut stmt = reader.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = page.iter().map(|i| i as &dyn rusqlite::ToSql).collect();
        let mut rows = stmt.query(params.as_slice())?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(row.get::<_, Option<String>>(i)?);
            }
            for (pattern, re) in &compiled {
                let Some(re) = re else { continue };
                let hit = values.iter().any(|v| v.as_deref().is_some_and(|s| re.is_match(s)));
                if hit {
                    *counts.get_mut(pattern).unwrap() += 1;
                }
            }
        }
    }

    Ok(counts)
}

pub fn ioc_match(
    tab: &Tab,
    filter: &FilterModel,
    patterns: &[String],
    pattern_batch: usize,
    page_rows: usize,
) -> AnalyticsResult<IocMatchResult> {
    let compiled = compiled_filter(tab, filter);
    let columns = tab.headers.safe_columns().to_vec();

    let matched_ids = find_matched_ids(
        tab,
        &compiled.where_clause,
        &compiled.params,
        &columns,
        patterns,
        pattern_batch,
    )?;
    let matched_row_ids: Vec<i64> = matched_ids.into_iter().collect();
    let pattern_counts = count_hits(tab, &matched_row_ids, &columns, patterns, page_rows)?;

    Ok(IocMatchResult { matched_row_ids, pattern_counts })
}
