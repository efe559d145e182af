//! Mixed-mode search tokenizer (§4.6): honors double-quoted phrases,
//! `+term` (require), `-term` (exclude), and `Column:value` (direct LIKE on
//! the matched column, dropped from the full-text side).

/// The parsed pieces of a mixed-mode search term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixedQuery {
    pub phrases: Vec<String>,
    pub required: Vec<String>,
    pub excluded: Vec<String>,
    pub bare: Vec<String>,
    /// `(safe_column, value)` pairs from `Column:value` tokens.
    pub column_matches: Vec<(String, String)>,
}

fn split_raw_tokens(term: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in term.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
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

/// Tokenizes `term` against the tab's `(original_header, safe_column)`
/// pairs, matching `Column:` prefixes case-insensitively against original
/// headers.
pub fn tokenize_mixed(term: &str, columns: &[(String, String)]) -> MixedQuery {
    let mut query = MixedQuery::default();

    for raw in split_raw_tokens(term) {
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            let phrase = raw[1..raw.len() - 1].to_string();
            if !phrase.is_empty() {
                query.phrases.push(phrase);
            }
            continue;
        }

        if let Some(stripped) = raw.strip_prefix('+') {
            if !stripped.is_empty() {
                query.required.push(stripped.to_string());
            }
            continue;
        }

        if let Some(stripped) = raw.strip_prefix('-') {
            if !stripped.is_empty() {
                query.excluded.push(stripped.to_string());
            }
            continue;
        }

        if let Some((col, value)) = raw.split_once(':') {
            if !col.is_empty() && !value.is_empty() {
                if let Some((_, safe)) = columns.iter().find(|(orig, _)| orig.eq_ignore_ascii_case(col)) {
                    query.column_matches.push((safe.clone(), value.to_string()));
                    continue;
                }
            }
        }

        if !raw.is_empty() {
            query.bare.push(raw);
        }
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<(String, String)> {
        vec![("Computer".into(), "c0".into()), ("Event".into(), "c1".into())]
    }

    #[test]
    fn parses_all_token_kinds() {
        let q = tokenize_mixed(r#""exact phrase" +required -excluded Computer:HOST1 bareterm"#, &cols());
        assert_eq!(q.phrases, vec!["exact phrase".to_string()]);
        assert_eq!(q.required, vec!["required".to_string()]);
        assert_eq!(q.excluded, vec!["excluded".to_string()]);
        assert_eq!(q.column_matches, vec![("c0".to_string(), "HOST1".to_string())]);
        assert_eq!(q.bare, vec!["bareterm".to_string()]);
    }

    #[test]
    fn unmatched_column_prefix_falls_back_to_bare() {
        let q = tokenize_mixed("NotAColumn:value", &cols());
        assert!(q.column_matches.is_empty());
        assert_eq!(q.bare, vec!["NotAColumn:value".to_string()]);
    }
}
