//! Registered scalar functions (§4.8, §4.6).
//!
//! `REGEXP`, `fuzzy_match`, and the three temporal functions are registered
//! on every connection opened by [`super::store::TabStore`] so they are
//! usable inside `WHERE`/`ORDER BY`. They are pure and deterministic, per
//! the Design Notes.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::temporal;

fn regex_cache() -> &'static std::sync::Mutex<std::collections::HashMap<String, regex::Regex>> {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<String, regex::Regex>>> =
        OnceLock::new();
    CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()))
}

fn compiled_case_insensitive(pattern: &str) -> Result<regex::Regex, regex::Error> {
    let mut cache = regex_cache().lock().unwrap();
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// n-gram overlap used by fuzzy search (§4.6): bigrams for terms shorter
/// than 5 characters, trigrams otherwise.
fn ngrams(s: &str, n: usize) -> HashSet<String> {
    let chars: Vec<char> = s.to_lowercase().chars().collect();
    if chars.len() < n {
        return HashSet::from([chars.into_iter().collect()]);
    }
    chars
        .windows(n)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// True if `needle` fuzzily matches within `haystack`. An exact substring
/// always matches; otherwise n-gram overlap must clear the threshold.
pub fn fuzzy_match(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    if haystack_lower.contains(&needle_lower) {
        return true;
    }

    let (n, threshold) = if needle.chars().count() < 5 {
        (2, 0.7)
    } else {
        (3, 0.6)
    };

    let needle_grams = ngrams(&needle_lower, n);
    if needle_grams.is_empty() {
        return false;
    }
    let hay_grams = ngrams(&haystack_lower, n);
    let overlap = needle_grams.intersection(&hay_grams).count();
    (overlap as f64 / needle_grams.len() as f64) >= threshold
}

/// Registers `REGEXP`, `fuzzy_match`, `extract_date`, `extract_datetime_minute`,
/// and `sort_datetime` on `conn`. Must be called on every connection the
/// store opens (writer and reader alike) because SQLite function
/// registration is per-connection.
pub fn register_all(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: String = ctx.get(0)?;
            let text: Option<String> = ctx.get(1)?;
            let text = match text {
                Some(t) => t,
                None => return Ok(false),
            };
            match compiled_case_insensitive(&pattern) {
                Ok(re) => Ok(re.is_match(&text)),
                Err(_) => Ok(false),
            }
        },
    )?;

    conn.create_scalar_function(
        "fuzzy_match",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: String = ctx.get(1)?;
            let haystack = haystack.unwrap_or_default();
            Ok(fuzzy_match(&haystack, &needle))
        },
    )?;

    conn.create_scalar_function(
        "extract_date",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let v: Option<String> = ctx.get(0)?;
            Ok(v.and_then(|v| temporal::extract_date(&v)))
        },
    )?;

    conn.create_scalar_function(
        "extract_datetime_minute",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let v: Option<String> = ctx.get(0)?;
            Ok(v.and_then(|v| temporal::extract_datetime_minute(&v)))
        },
    )?;

    conn.create_scalar_function(
        "sort_datetime",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let v: Option<String> = ctx.get(0)?;
            Ok(v.map(|v| temporal::sort_datetime(&v)))
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_exact_substring_always_matches() {
        assert!(fuzzy_match("powershell.exe -enc abc", "powershell"));
    }

    #[test]
    fn fuzzy_short_term_bigram_threshold() {
        assert!(fuzzy_match("cnd.exe", "cmd"));
    }

    #[test]
    fn fuzzy_long_term_trigram_threshold() {
        assert!(fuzzy_match("powershll", "powershell"));
        assert!(!fuzzy_match("completely unrelated text", "powershell"));
    }
}
