//! Self-contained HTML report (§6 "HTML report"): summary cards, a tag
//! chip index, a bookmarked-events table, and one table per tag. No
//! external assets — styles are inlined so the file opens standalone.

use crate::error::AnalyticsResult;
use crate::tab::Tab;
use std::fmt::Write as _;

pub struct ReportOptions {
    pub title: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { title: "Timeline Report".to_string() }
    }
}

struct RowSnapshot {
    id: i64,
    values: Vec<Option<String>>,
}

fn fetch_rows_by_id(tab: &Tab, ids: &[i64]) -> AnalyticsResult<Vec<RowSnapshot>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let columns = tab.headers.safe_columns().join(", ");
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT id, {columns} FROM rows WHERE id IN ({placeholders}) ORDER BY id");

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let ncols = tab.headers.safe_columns().len();
    let params: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|i| i as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params.as_slice(), move |r| {
            let id: i64 = r.get(0)?;
            let mut values = Vec::with_capacity(ncols);
            for i in 0..ncols {
                values.push(r.get::<_, Option<String>>(1 + i)?);
            }
            Ok(RowSnapshot { id, values })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

fn rows_tagged(tab: &Tab, label: &str) -> AnalyticsResult<Vec<i64>> {
    let reader = tab.store.reader();
    let mut stmt = reader.prepare("SELECT DISTINCT row_id FROM tags WHERE label = ? ORDER BY row_id")?;
    let ids = stmt
        .query_map([label], |r| r.get::<_, i64>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(ids)
}

fn timestamp_range(tab: &Tab) -> AnalyticsResult<Option<(String, String)>> {
    let Some(ts_column) = tab.timestamp_columns.read().unwrap().first().cloned() else {
        return Ok(None);
    };
    let Some(safe) = tab.headers.safe_for(&ts_column).map(str::to_string) else {
        return Ok(None);
    };
    let reader = tab.store.reader();
    let sql = format!(
        "SELECT (SELECT {safe} FROM rows WHERE {safe} IS NOT NULL ORDER BY sort_datetime({safe}) ASC LIMIT 1), \
                (SELECT {safe} FROM rows WHERE {safe} IS NOT NULL ORDER BY sort_datetime({safe}) DESC LIMIT 1)"
    );
    let range: (Option<String>, Option<String>) = reader.query_row(&sql, [], |r| Ok((r.get(0)?, r.get(1)?)))?;
    Ok(match range {
        (Some(min), Some(max)) => Some((min, max)),
        _ => None,
    })
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_table(out: &mut String, headers: &[String], rows: &[RowSnapshot]) {
    out.push_str("<table><thead><tr>");
    for header in headers {
        let _ = write!(out, "<th>{}</th>", escape_html(header));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for value in &row.values {
            let _ = write!(out, "<td>{}</td>", escape_html(value.as_deref().unwrap_or("")));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
}

/// Renders the whole report to a standalone HTML string. Never touches
/// disk itself; callers decide where the report lands.
pub fn render(tab: &Tab, options: &ReportOptions) -> AnalyticsResult<String> {
    let total_rows = tab.store.row_count()?;
    let bookmarked_ids = tab.store.bookmarked_row_ids()?;
    let distinct_tags = tab.store.distinct_tag_labels()?;
    let range = timestamp_range(tab)?;

    let mut tagged_row_ids = std::collections::HashSet::new();
    let mut tag_tables = String::new();
    for label in &distinct_tags {
        let ids = rows_tagged(tab, label)?;
        tagged_row_ids.extend(ids.iter().copied());
        let rows = fetch_rows_by_id(tab, &ids)?;
        let _ = write!(
            tag_tables,
            "<h2>Tag: {} <span class=\"count\">({} rows)</span></h2>",
            escape_html(label),
            rows.len()
        );
        render_table(&mut tag_tables, tab.headers.original_headers(), &rows);
    }

    let bookmarked_rows = fetch_rows_by_id(tab, &bookmarked_ids)?;
    let mut bookmarked_table = String::new();
    render_table(&mut bookmarked_table, tab.headers.original_headers(), &bookmarked_rows);

    let chips: String = distinct_tags
        .iter()
        .map(|t| format!("<span class=\"chip\">{}</span>", escape_html(t)))
        .collect();

    let range_html = match range {
        Some((min, max)) => format!("{} &ndash; {}", escape_html(&min), escape_html(&max)),
        None => "n/a".to_string(),
    };

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, Segoe UI, Arial, sans-serif; margin: 2rem; color: #1a1a1a; }}
h1 {{ margin-bottom: 0.25rem; }}
.subtitle {{ color: #666; margin-top: 0; }}
.cards {{ display: flex; gap: 1rem; flex-wrap: wrap; margin: 1.5rem 0; }}
.card {{ border: 1px solid #ddd; border-radius: 6px; padding: 0.75rem 1.25rem; min-width: 140px; }}
.card .value {{ font-size: 1.6rem; font-weight: 600; }}
.card .label {{ color: #666; font-size: 0.85rem; }}
.chip {{ display: inline-block; background: #eef2ff; border: 1px solid #c7d2fe; border-radius: 999px;
         padding: 0.15rem 0.7rem; margin: 0.15rem; font-size: 0.85rem; }}
table {{ border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; font-size: 0.85rem; }}
th, td {{ border: 1px solid #ddd; padding: 0.35rem 0.5rem; text-align: left; }}
th {{ background: #f5f5f5; }}
.count {{ color: #666; font-weight: normal; font-size: 0.9rem; }}
@media print {{ body {{ margin: 0.5rem; }} .card {{ break-inside: avoid; }} }}
</style>
</head>
<body>
<h1>{title}</h1>
<p class="subtitle">{range_html}</p>
<div class="cards">
<div class="card"><div class="value">{total_rows}</div><div class="label">Total rows</div></div>
<div class="card"><div class="value">{bookmarked}</div><div class="label">Bookmarked</div></div>
<div class="card"><div class="value">{tagged}</div><div class="label">Tagged rows</div></div>
<div class="card"><div class="value">{tag_count}</div><div class="label">Distinct tags</div></div>
</div>
<div>{chips}</div>
<h2>Bookmarked events</h2>
{bookmarked_table}
{tag_tables}
</body>
</html>
"#,
        title = escape_html(&options.title),
        range_html = range_html,
        total_rows = total_rows,
        bookmarked = bookmarked_ids.len(),
        tagged = tagged_row_ids.len(),
        tag_count = distinct_tags.len(),
        chips = chips,
        bookmarked_table = bookmarked_table,
        tag_tables = tag_tables,
    );

    Ok(html)
}

pub fn write_to_file(tab: &Tab, options: &ReportOptions, path: &std::path::Path) -> crate::error::Result<()> {
    let html = render(tab, options)?;
    std::fs::write(path, html)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_script_tags() {
        assert_eq!(escape_html("<script>"), "&lt;script&gt;");
    }
}
