//! Value stacking (§4.7): group-by on a column under the current filter,
//! capped at `stacking_value_cap` unique values with a `truncated` flag
//! rather than an error when the cap is hit.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOrder {
    CountDescending,
    ValueAscending,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackedValue {
    pub value: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackingResult {
    pub values: Vec<StackedValue>,
    pub truncated: bool,
}

pub fn stack(
    tab: &Tab,
    filter: &FilterModel,
    column: &str,
    order: StackOrder,
    cap: usize,
) -> AnalyticsResult<StackingResult> {
    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let order_sql = match order {
        StackOrder::CountDescending => "cnt DESC",
        StackOrder::ValueAscending => "value ASC",
    };
    let sql = format!(
        "SELECT {column} AS value, COUNT(*) AS cnt FROM rows{where_sql} GROUP BY {column} ORDER BY {order_sql} LIMIT {}",
        cap + 1
    );

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let mut values: Vec<StackedValue> = stmt
        .query_map(bind_params(&compiled.params).as_slice(), |r| {
            Ok(StackedValue { value: r.get(0)?, count: r.get(1)? })
        })?
        .filter_map(|r| r.ok())
        .collect();

    let truncated = values.len() > cap;
    values.truncate(cap);

    Ok(StackingResult { values, truncated })
}
