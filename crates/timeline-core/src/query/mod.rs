//! Query engine (§4.4, §4.5): windowed row fetch, count caching, lazy
//! sort-index materialization, and the unique/group-value helpers behind
//! checkbox dropdowns and multi-level grouping.

use crate::error::StorageResult;
use crate::filter::{compile, FilterModel};
use crate::search;
use crate::tab::Tab;
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    pub id: i64,
    pub values: Vec<Option<String>>,
    pub bookmarked: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub rows: Vec<RowResult>,
    pub total_filtered: i64,
}

pub(crate) fn header_pairs(tab: &Tab) -> Vec<(String, String)> {
    tab.headers
        .original_headers()
        .iter()
        .cloned()
        .zip(tab.headers.safe_columns().iter().cloned())
        .collect()
}

fn order_by_expr(tab: &Tab, column: &str) -> String {
    if tab.is_timestamp_column(column) {
        format!("sort_datetime({column})")
    } else if tab.is_numeric_column(column) {
        format!("CAST({column} AS REAL)")
    } else {
        format!("{column} COLLATE NOCASE")
    }
}

pub(crate) fn compiled_filter(tab: &Tab, filter: &FilterModel) -> crate::filter::CompiledFilter {
    let search_fragment = filter
        .search
        .as_ref()
        .map(|s| search::compile_search(s, &header_pairs(tab), tab.fts_ready()));
    compile(filter, search_fragment)
}

pub(crate) fn bind_params(params: &[Value]) -> Vec<&dyn rusqlite::ToSql> {
    params.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
}

/// Count rows matching `filter`, using the tab's single-slot count cache
/// (§4.1, §4.4) keyed by the compiled filter's signature.
pub fn count_filtered(tab: &Tab, filter: &FilterModel) -> StorageResult<i64> {
    let compiled = compiled_filter(tab, filter);
    let signature = compiled.signature();
    if let Some(cached) = tab.store.cached_count(&signature) {
        return Ok(cached);
    }
    let reader = tab.store.reader();
    let sql = if compiled.where_clause.is_empty() {
        "SELECT COUNT(*) FROM rows".to_string()
    } else {
        format!("SELECT COUNT(*) FROM rows WHERE {}", compiled.where_clause)
    };
    let count: i64 = reader.query_row(&sql, bind_params(&compiled.params).as_slice(), |r| r.get(0))?;
    drop(reader);
    tab.store.store_count(signature, count);
    Ok(count)
}

/// Windowed fetch (§4.4): `(filter, sort, offset, limit) → rows +
/// total-after-filter + per-row bookmark/tag annotations`, annotation
/// lookups batched in groups of 5,000 row identifiers.
pub fn windowed_fetch(
    tab: &Tab,
    filter: &FilterModel,
    sort: Option<&SortSpec>,
    offset: i64,
    limit: i64,
    annotation_batch_rows: usize,
) -> StorageResult<QueryResponse> {
    let total_filtered = count_filtered(tab, filter)?;
    let compiled = compiled_filter(tab, filter);

    if let Some(sort) = sort {
        // Lazy sort-index build (§4.4): first sort against a column builds
        // its index if the background job hasn't already.
        tab.store.ensure_sort_index(&sort.column)?;
    }

    let columns = tab.headers.safe_columns().join(", ");
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let order_sql = match sort {
        Some(s) => format!(" ORDER BY {} {}", order_by_expr(tab, &s.column), s.direction.sql()),
        None => " ORDER BY id ASC".to_string(),
    };
    let sql = format!(
        "SELECT id, {columns} FROM rows{where_sql}{order_sql} LIMIT ? OFFSET ?"
    );

    let ncols = tab.headers.safe_columns().len();
    let mut params: Vec<Value> = compiled.params.clone();
    params.push(Value::Integer(limit));
    params.push(Value::Integer(offset));

    let mut results = {
        let reader = tab.store.reader();
        let mut stmt = reader.prepare(&sql)?;
        let mut rows = stmt.query(bind_params(&params).as_slice())?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let mut values = Vec::with_capacity(ncols);
            for i in 0..ncols {
                values.push(row.get::<_, Option<String>>(1 + i)?);
            }
            results.push(RowResult { id, values, bookmarked: false, tags: Vec::new() });
        }
        results
    };

    annotate_rows(tab, &mut results, annotation_batch_rows)?;

    Ok(QueryResponse { rows: results, total_filtered })
}

/// Batches row-identifier lookups in groups of `batch_rows` to respect
/// SQLite's host-parameter limit (§4.4).
fn annotate_rows(tab: &Tab, rows: &mut [RowResult], batch_rows: usize) -> StorageResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let reader = tab.store.reader();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let mut bookmarked = std::collections::HashSet::new();
    let mut tags: std::collections::HashMap<i64, Vec<String>> = std::collections::HashMap::new();

    for chunk in ids.chunks(batch_rows) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT row_id FROM bookmarks WHERE row_id IN ({placeholders})");
        let mut stmt = reader.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = chunk.iter().map(|i| i as &dyn rusqlite::ToSql).collect();
        let found = stmt.query_map(params.as_slice(), |r| r.get::<_, i64>(0))?;
        for id in found.filter_map(|r| r.ok()) {
            bookmarked.insert(id);
        }

        let sql = format!("SELECT row_id, label FROM tags WHERE row_id IN ({placeholders})");
        let mut stmt = reader.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = chunk.iter().map(|i| i as &dyn rusqlite::ToSql).collect();
        let found = stmt.query_map(params.as_slice(), |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
        })?;
        for pair in found.filter_map(|r| r.ok()) {
            tags.entry(pair.0).or_default().push(pair.1);
        }
    }

    for row in rows.iter_mut() {
        row.bookmarked = bookmarked.contains(&row.id);
        if let Some(labels) = tags.remove(&row.id) {
            row.tags = labels;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueCount {
    pub value: Option<String>,
    pub count: i64,
}

/// Unique values for checkbox dropdowns (§4.5): top `limit` values of
/// `column` under every filter except the checkbox filter on that same
/// column, so deselecting a value doesn't remove it as a candidate.
pub fn unique_values(
    tab: &Tab,
    filter: &FilterModel,
    column: &str,
    limit: usize,
) -> StorageResult<Vec<ValueCount>> {
    let mut filter = filter.clone();
    filter.checkboxes.retain(|c| c.column != column);

    let compiled = compiled_filter(tab, &filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let sql = format!(
        "SELECT {column}, COUNT(*) as cnt FROM rows{where_sql} GROUP BY {column} ORDER BY cnt DESC LIMIT {limit}"
    );
    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let rows = stmt
        .query_map(bind_params(&compiled.params).as_slice(), |r| {
            Ok(ValueCount { value: r.get(0)?, count: r.get(1)? })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupCount {
    pub group_column: String,
    pub value: Option<String>,
    pub count: i64,
}

/// Multi-level grouping (§4.5): group value + count for `group_column`
/// constrained by `parent_values` (a tuple of `(safe_column, value)`
/// equality constraints from the outer grouping levels), respecting every
/// filter.
pub fn group_values(
    tab: &Tab,
    filter: &FilterModel,
    group_column: &str,
    parent_values: &[(String, String)],
) -> StorageResult<Vec<GroupCount>> {
    let mut compiled = compiled_filter(tab, filter);
    let mut extra_params = compiled.params.clone();
    let mut parts = Vec::new();
    if !compiled.where_clause.is_empty() {
        parts.push(compiled.where_clause.clone());
    }
    for (col, value) in parent_values {
        parts.push(format!("{col} = ?"));
        extra_params.push(Value::Text(value.clone()));
    }
    compiled.where_clause = parts.join(" AND ");
    compiled.params = extra_params;

    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let sql = format!(
        "SELECT {group_column}, COUNT(*) as cnt FROM rows{where_sql} GROUP BY {group_column} ORDER BY cnt DESC"
    );
    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let rows = stmt
        .query_map(bind_params(&compiled.params).as_slice(), |r| {
            Ok(GroupCount {
                group_column: group_column.to_string(),
                value: r.get(0)?,
                count: r.get(1)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
