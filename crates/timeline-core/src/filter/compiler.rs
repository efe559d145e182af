//! Filter compiler (§4.3): translates the composite filter model into a
//! `WHERE` fragment (without the leading `WHERE`) plus an ordered parameter
//! list. User values are never interpolated into the SQL text — every
//! value flows through a bound parameter — so the compiler output is safe
//! against injection by construction.

use super::{AdvancedOperator, FilterLogic, FilterModel};
use rusqlite::types::Value;

/// A compiled filter: the concatenated `WHERE` body and its parameters, in
/// bind order. An empty `where_clause` means "match everything".
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    pub where_clause: String,
    pub params: Vec<Value>,
}

impl CompiledFilter {
    /// A stable signature of this compiled filter, used as the count-cache
    /// key (§4.1, §4.4): the WHERE text plus a serialization of the bound
    /// parameters, since two different param sets can share SQL text.
    pub fn signature(&self) -> String {
        let mut sig = self.where_clause.clone();
        for p in &self.params {
            sig.push('\u{1}');
            match p {
                Value::Null => sig.push_str("<null>"),
                Value::Integer(i) => sig.push_str(&i.to_string()),
                Value::Real(r) => sig.push_str(&r.to_string()),
                Value::Text(t) => sig.push_str(t),
                Value::Blob(b) => sig.push_str(&format!("{b:?}")),
            }
        }
        sig
    }
}

fn push_and(parts: &mut Vec<String>, fragment: String) {
    if !fragment.is_empty() {
        parts.push(fragment);
    }
}

/// Compiles everything except the global-search fragment (built separately
/// by the search subsystem, since it depends on FTS readiness). Pass the
/// search fragment's `(sql, params)` in `search_fragment` to append it as
/// the final AND'd term, matching the §4.3 concatenation order.
pub fn compile(
    model: &FilterModel,
    search_fragment: Option<(String, Vec<Value>)>,
) -> CompiledFilter {
    let mut parts: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    // 1. Column substring filters.
    for f in &model.substrings {
        if f.value.is_empty() {
            continue;
        }
        parts.push(format!("{} LIKE ?", f.column));
        params.push(Value::Text(format!("%{}%", f.value)));
    }

    // 2. Checkbox sets.
    for f in &model.checkboxes {
        let mut or_parts = Vec::new();
        if f.includes_null_sentinel() {
            or_parts.push(format!("({0} IS NULL OR {0} = '')", f.column));
        }
        let non_null = f.non_null_values();
        if !non_null.is_empty() {
            let placeholders = vec!["?"; non_null.len()].join(", ");
            or_parts.push(format!("{} IN ({})", f.column, placeholders));
            for v in non_null {
                params.push(Value::Text(v.to_string()));
            }
        }
        if !or_parts.is_empty() {
            push_and(&mut parts, format!("({})", or_parts.join(" OR ")));
        }
    }

    // 3. Date range filters (inclusive lexicographic comparison).
    for f in &model.date_ranges {
        if let Some(from) = &f.from {
            parts.push(format!("{} >= ?", f.column));
            params.push(Value::Text(from.clone()));
        }
        if let Some(to) = &f.to {
            parts.push(format!("{} <= ?", f.column));
            params.push(Value::Text(to.clone()));
        }
    }

    // 4. Bookmark-only.
    if model.bookmarked_only {
        parts.push("id IN (SELECT row_id FROM bookmarks)".to_string());
    }

    // 5. Tag filter.
    if let Some(tag_filter) = &model.tag_filter {
        use super::TagFilter::*;
        match tag_filter {
            None => {}
            AnyTagged => parts.push("id IN (SELECT row_id FROM tags)".to_string()),
            Label(label) => {
                parts.push("id IN (SELECT row_id FROM tags WHERE label = ?)".to_string());
                params.push(Value::Text(label.clone()));
            }
            Labels(labels) if !labels.is_empty() => {
                let placeholders = vec!["?"; labels.len()].join(", ");
                parts.push(format!(
                    "id IN (SELECT row_id FROM tags WHERE label IN ({placeholders}))"
                ));
                for l in labels {
                    params.push(Value::Text(l.clone()));
                }
            }
            Labels(_) => {}
        }
    }

    // 6. Advanced filters: OR-of-AND groups.
    if !model.advanced.is_empty() {
        let mut groups: Vec<Vec<String>> = vec![Vec::new()];
        for cond in &model.advanced {
            if cond.logic == FilterLogic::Or && !groups.last().unwrap().is_empty() {
                groups.push(Vec::new());
            }
            let (frag, mut p) = compile_advanced_condition(cond);
            groups.last_mut().unwrap().push(frag);
            params.append(&mut p);
        }
        let group_sql: Vec<String> = groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|g| format!("({})", g.join(" AND ")))
            .collect();
        if !group_sql.is_empty() {
            parts.push(format!("({})", group_sql.join(" OR ")));
        }
    }

    // 7. Global search.
    if let Some((sql, mut search_params)) = search_fragment {
        if !sql.is_empty() {
            parts.push(sql);
            params.append(&mut search_params);
        }
    }

    CompiledFilter {
        where_clause: parts.join(" AND "),
        params,
    }
}

fn compile_advanced_condition(cond: &super::AdvancedCondition) -> (String, Vec<Value>) {
    let col = &cond.column;
    match cond.operator {
        AdvancedOperator::Contains => (
            format!("{col} LIKE ?"),
            vec![Value::Text(format!("%{}%", cond.value.clone().unwrap_or_default()))],
        ),
        AdvancedOperator::NotContains => (
            format!("({col} IS NULL OR {col} NOT LIKE ?)"),
            vec![Value::Text(format!("%{}%", cond.value.clone().unwrap_or_default()))],
        ),
        AdvancedOperator::Equals => (
            format!("{col} = ?"),
            vec![Value::Text(cond.value.clone().unwrap_or_default())],
        ),
        AdvancedOperator::NotEquals => (
            format!("({col} IS NULL OR {col} != ?)"),
            vec![Value::Text(cond.value.clone().unwrap_or_default())],
        ),
        AdvancedOperator::StartsWith => (
            format!("{col} LIKE ?"),
            vec![Value::Text(format!("{}%", cond.value.clone().unwrap_or_default()))],
        ),
        AdvancedOperator::EndsWith => (
            format!("{col} LIKE ?"),
            vec![Value::Text(format!("%{}", cond.value.clone().unwrap_or_default()))],
        ),
        AdvancedOperator::GreaterThan => {
            let v: f64 = cond.value.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
            (format!("CAST({col} AS REAL) > ?"), vec![Value::Real(v)])
        }
        AdvancedOperator::LessThan => {
            let v: f64 = cond.value.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
            (format!("CAST({col} AS REAL) < ?"), vec![Value::Real(v)])
        }
        AdvancedOperator::IsEmpty => (format!("({col} IS NULL OR {col} = '')"), vec![]),
        AdvancedOperator::IsNotEmpty => (format!("({col} IS NOT NULL AND {col} != '')"), vec![]),
        AdvancedOperator::Regex => {
            let pattern = cond.value.clone().unwrap_or_default();
            match regex::RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(_) => (format!("{col} REGEXP ?"), vec![Value::Text(pattern)]),
                // §7: an invalid regex degrades the condition to "match
                // nothing" rather than aborting the whole query.
                Err(_) => {
                    tracing::warn!(%pattern, "invalid regex in advanced filter, degrading to match-nothing");
                    ("0".to_string(), vec![])
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CheckboxFilter, SubstringFilter};

    #[test]
    fn substring_is_parameterized() {
        let model = FilterModel {
            substrings: vec![SubstringFilter { column: "c0".into(), value: "admin".into() }],
            ..Default::default()
        };
        let compiled = compile(&model, None);
        assert_eq!(compiled.where_clause, "c0 LIKE ?");
        assert!(!compiled.where_clause.contains("admin"));
        assert_eq!(compiled.params, vec![Value::Text("%admin%".into())]);
    }

    #[test]
    fn checkbox_null_sentinel_and_values_or_together() {
        let model = FilterModel {
            checkboxes: vec![CheckboxFilter { column: "c1".into(), values: vec!["".into(), "x".into()] }],
            ..Default::default()
        };
        let compiled = compile(&model, None);
        assert!(compiled.where_clause.contains("IS NULL OR c1 = ''"));
        assert!(compiled.where_clause.contains("c1 IN (?)"));
    }

    #[test]
    fn invalid_regex_degrades_to_match_nothing() {
        let model = FilterModel {
            advanced: vec![super::super::AdvancedCondition {
                column: "c0".into(),
                operator: AdvancedOperator::Regex,
                value: Some("(".into()),
                logic: FilterLogic::And,
            }],
            ..Default::default()
        };
        let compiled = compile(&model, None);
        assert_eq!(compiled.where_clause, "(0)");
    }
}
