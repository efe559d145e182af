//! Header sanitization and the bidirectional original-header ↔ safe-
//! identifier map (§3, §9 "Dynamic column schemas → safe identifiers").

use std::collections::HashMap;
use std::sync::OnceLock;

fn timestamp_header_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::RegexBuilder::new(r"(time|date|timestamp|created|modified|accessed|when|start|end|written)")
            .case_insensitive(true)
            .build()
            .unwrap()
    })
}

/// True if `header` looks like a timestamp column by name.
pub fn is_timestamp_header(header: &str) -> bool {
    timestamp_header_re().is_match(header)
}

/// Sanitizes raw source headers: empties become `Column`, and duplicate
/// names (after that substitution) are disambiguated by suffixing `_N`
/// with a per-name counter. Returns the sanitized, still human-readable
/// headers in their original order.
pub fn sanitize_raw_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.iter()
        .map(|h| {
            let base = if h.trim().is_empty() {
                "Column".to_string()
            } else {
                h.clone()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{base}_{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Assigns opaque `c0`, `c1`, … identifiers to a slice of already-sanitized
/// headers, in order.
pub fn sanitize_headers(raw: &[String]) -> (Vec<String>, Vec<String>) {
    let sanitized = sanitize_raw_headers(raw);
    let safe = (0..sanitized.len()).map(|i| format!("c{i}")).collect();
    (sanitized, safe)
}

/// Bidirectional mapping between a tab's human-readable (sanitized) headers
/// and the opaque safe identifiers used for SQL generation and row access.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    original: Vec<String>,
    safe: Vec<String>,
    original_to_safe: HashMap<String, String>,
}

impl HeaderMap {
    pub fn new(raw_headers: Vec<String>) -> Self {
        let (original, safe) = sanitize_headers(&raw_headers);
        let original_to_safe = original
            .iter()
            .cloned()
            .zip(safe.iter().cloned())
            .collect();
        Self {
            original,
            safe,
            original_to_safe,
        }
    }

    pub fn original_headers(&self) -> &[String] {
        &self.original
    }

    pub fn safe_columns(&self) -> &[String] {
        &self.safe
    }

    pub fn safe_for(&self, original: &str) -> Option<&str> {
        self.original_to_safe.get(original).map(|s| s.as_str())
    }

    pub fn original_for(&self, safe: &str) -> Option<&str> {
        self.safe
            .iter()
            .position(|s| s == safe)
            .map(|i| self.original[i].as_str())
    }

    pub fn column_count(&self) -> usize {
        self.safe.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_fills_empty() {
        let raw = vec!["Name".to_string(), "".to_string(), "Name".to_string()];
        let (sanitized, safe) = sanitize_headers(&raw);
        assert_eq!(sanitized, vec!["Name", "Column", "Name_1"]);
        assert_eq!(safe, vec!["c0", "c1", "c2"]);
    }

    #[test]
    fn timestamp_detection() {
        assert!(is_timestamp_header("EventCreated"));
        assert!(is_timestamp_header("timestamp"));
        assert!(!is_timestamp_header("Computer"));
    }
}
