//! Search subsystem (§4.6): mixed / phrase / regex / fuzzy search, with a
//! lazy FTS build and a LIKE fallback while the index isn't ready.

mod tokenizer;

pub use tokenizer::{tokenize_mixed, MixedQuery};

use crate::filter::{GlobalSearch, SearchCondition, SearchMode};
use rusqlite::types::Value;

/// Per-column fragment for one token under one condition, OR'd across
/// every column.
fn condition_fragment(columns: &[String], condition: SearchCondition, token: &str) -> (String, Vec<Value>) {
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for col in columns {
        let (frag, value) = match condition {
            SearchCondition::Contains => (format!("{col} LIKE ?"), Value::Text(format!("%{token}%"))),
            SearchCondition::Startswith => (format!("{col} LIKE ?"), Value::Text(format!("{token}%"))),
            SearchCondition::Like => (format!("{col} LIKE ?"), Value::Text(token.to_string())),
            SearchCondition::Equals => (format!("{col} = ?"), Value::Text(token.to_string())),
            SearchCondition::Fuzzy => (format!("fuzzy_match({col}, ?)"), Value::Text(token.to_string())),
        };
        parts.push(frag);
        params.push(value);
    }
    (format!("({})", parts.join(" OR ")), params)
}

fn regex_fragment(columns: &[String], pattern: &str) -> (String, Vec<Value>) {
    if regex::RegexBuilder::new(pattern).case_insensitive(true).build().is_err() {
        tracing::warn!(%pattern, "invalid regex in search, degrading to match-nothing");
        return ("0".to_string(), vec![]);
    }
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for col in columns {
        parts.push(format!("{col} REGEXP ?"));
        params.push(Value::Text(pattern.to_string()));
    }
    (format!("({})", parts.join(" OR ")), params)
}

/// Splits `term` into whitespace-delimited tokens, honoring double-quoted
/// phrases as a single token (used by And/Or/Exact modes, which are
/// non-default conditions that bypass FTS per §4.6).
fn split_terms(term: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in term.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Compiles a [`GlobalSearch`] against `columns` (tab-original-header,
/// safe-column pairs) into a `(sql, params)` fragment, the seventh and
/// final term the filter compiler AND's in (§4.3 step 7). `fts_ready`
/// governs whether mixed-mode search can use the FTS5 index or must fall
/// back to LIKE (§4.1, §4.6).
pub fn compile_search(
    search: &GlobalSearch,
    columns: &[(String, String)],
    fts_ready: bool,
) -> (String, Vec<Value>) {
    let safe_columns: Vec<String> = columns.iter().map(|(_, safe)| safe.clone()).collect();
    if search.term.trim().is_empty() {
        return (String::new(), Vec::new());
    }

    match search.mode {
        SearchMode::Regex => regex_fragment(&safe_columns, &search.term),
        SearchMode::Exact => condition_fragment(&safe_columns, search.condition, &search.term),
        SearchMode::And | SearchMode::Or => {
            let joiner = if matches!(search.mode, SearchMode::And) { " AND " } else { " OR " };
            let tokens = split_terms(&search.term);
            if tokens.is_empty() {
                return (String::new(), Vec::new());
            }
            let mut parts = Vec::new();
            let mut params = Vec::new();
            for token in tokens {
                let (frag, mut p) = condition_fragment(&safe_columns, search.condition, &token);
                parts.push(frag);
                params.append(&mut p);
            }
            (format!("({})", parts.join(joiner)), params)
        }
        SearchMode::Mixed => compile_mixed(search, columns, fts_ready),
    }
}

fn compile_mixed(
    search: &GlobalSearch,
    columns: &[(String, String)],
    fts_ready: bool,
) -> (String, Vec<Value>) {
    let safe_columns: Vec<String> = columns.iter().map(|(_, safe)| safe.clone()).collect();
    let query = tokenize_mixed(&search.term, columns);

    let mut parts = Vec::new();
    let mut params = Vec::new();

    // Column:value tokens always compile to a direct LIKE regardless of FTS
    // readiness, and drop out of the full-text side (§4.6).
    for (safe_col, value) in &query.column_matches {
        parts.push(format!("{safe_col} LIKE ?"));
        params.push(Value::Text(format!("%{value}%")));
    }

    // Excluded terms always compile to a direct NOT LIKE across columns.
    for term in &query.excluded {
        let mut excl = Vec::new();
        for col in &safe_columns {
            excl.push(format!("({col} IS NULL OR {col} NOT LIKE ?)"));
            params.push(Value::Text(format!("%{term}%")));
        }
        parts.push(format!("({})", excl.join(" AND ")));
    }

    let fts_terms: Vec<&str> = query
        .phrases
        .iter()
        .map(|s| s.as_str())
        .chain(query.required.iter().map(|s| s.as_str()))
        .chain(query.bare.iter().map(|s| s.as_str()))
        .collect();

    if !fts_terms.is_empty() {
        if fts_ready {
            let mut match_expr = String::new();
            for phrase in &query.phrases {
                if !match_expr.is_empty() {
                    match_expr.push_str(" AND ");
                }
                match_expr.push_str(&format!("\"{}\"", phrase.replace('"', "\"\"")));
            }
            for term in query.required.iter().chain(query.bare.iter()) {
                if !match_expr.is_empty() {
                    match_expr.push_str(" AND ");
                }
                match_expr.push_str(&sanitize_fts5_term(term));
            }
            parts.push("id IN (SELECT rowid FROM rows_fts WHERE rows_fts MATCH ?)".to_string());
            params.push(Value::Text(match_expr));
        } else {
            // LIKE fallback (§4.1, §4.6): same AND-of-bare-terms semantics,
            // OR'd across every column per term.
            for term in &fts_terms {
                let (frag, mut p) = condition_fragment(&safe_columns, SearchCondition::Contains, term);
                parts.push(frag);
                params.append(&mut p);
            }
        }
    }

    if parts.is_empty() {
        return (String::new(), Vec::new());
    }
    (format!("({})", parts.join(" AND ")), params)
}

/// Strips FTS5 query-syntax metacharacters from a bare term so it can be
/// embedded in a MATCH expression without being parsed as an operator.
pub fn sanitize_fts5_term(term: &str) -> String {
    let cleaned: String = term.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();
    format!("\"{}\"", cleaned.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SearchCondition;

    fn cols() -> Vec<(String, String)> {
        vec![("Computer".into(), "c0".into()), ("Event".into(), "c1".into())]
    }

    #[test]
    fn and_mode_joins_tokens_with_and() {
        let search = GlobalSearch { term: "foo bar".into(), mode: SearchMode::And, condition: SearchCondition::Contains };
        let (sql, params) = compile_search(&search, &cols(), false);
        assert!(sql.contains(" AND "));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn mixed_fallback_to_like_when_fts_not_ready() {
        let search = GlobalSearch { term: "powershell".into(), mode: SearchMode::Mixed, condition: SearchCondition::Contains };
        let (sql, _params) = compile_search(&search, &cols(), false);
        assert!(sql.contains("LIKE"));
        assert!(!sql.contains("MATCH"));
    }

    #[test]
    fn mixed_uses_fts_when_ready() {
        let search = GlobalSearch { term: "powershell".into(), mode: SearchMode::Mixed, condition: SearchCondition::Contains };
        let (sql, _params) = compile_search(&search, &cols(), true);
        assert!(sql.contains("MATCH"));
    }

    #[test]
    fn column_value_token_drops_from_fts_side() {
        let search = GlobalSearch { term: "Computer:HOST1 login".into(), mode: SearchMode::Mixed, condition: SearchCondition::Contains };
        let (sql, params) = compile_search(&search, &cols(), true);
        assert!(sql.contains("c0 LIKE ?"));
        assert!(params.iter().any(|p| matches!(p, Value::Text(t) if t.contains("HOST1"))));
    }
}
