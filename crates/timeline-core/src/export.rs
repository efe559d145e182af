//! Filtered row export (§6 "Export format"): CSV, TSV, and streaming XLSX,
//! over the same filter-compiled row set the query engine reads.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter, header_pairs};
use crate::tab::Tab;
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Xlsx,
}

fn fetch_rows(tab: &Tab, filter: &FilterModel) -> AnalyticsResult<(Vec<String>, impl Iterator<Item = Vec<Option<String>>>)> {
    let pairs = header_pairs(tab);
    let originals: Vec<String> = pairs.iter().map(|(o, _)| o.clone()).collect();
    let safe_cols: Vec<String> = pairs.iter().map(|(_, s)| s.clone()).collect();

    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let sql = format!("SELECT {} FROM rows{where_sql} ORDER BY id", safe_cols.join(", "));

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let n = safe_cols.len();
    let rows: Vec<Vec<Option<String>>> = stmt
        .query_map(bind_params(&compiled.params).as_slice(), move |r| {
            let mut values = Vec::with_capacity(n);
            for i in 0..n {
                values.push(r.get::<_, Option<String>>(i)?);
            }
            Ok(values)
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok((originals, rows.into_iter()))
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

pub fn export_csv(tab: &Tab, filter: &FilterModel, path: &Path) -> Result<(), CrateExportError> {
    export_delimited(tab, filter, path, ',', csv_field)
}

pub fn export_tsv(tab: &Tab, filter: &FilterModel, path: &Path) -> Result<(), CrateExportError> {
    export_delimited(tab, filter, path, '\t', tsv_field)
}

fn export_delimited(
    tab: &Tab,
    filter: &FilterModel,
    path: &Path,
    sep: char,
    escape: fn(&str) -> String,
) -> Result<(), CrateExportError> {
    let (headers, rows) = fetch_rows(tab, filter)?;
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);

    let header_line = headers.iter().map(|h| escape(h)).collect::<Vec<_>>().join(&sep.to_string());
    writeln!(file, "{header_line}")?;

    for row in rows {
        let line = row
            .iter()
            .map(|v| escape(v.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join(&sep.to_string());
        writeln!(file, "{line}")?;
    }

    file.flush()?;
    Ok(())
}

pub fn export_xlsx(tab: &Tab, filter: &FilterModel, path: &Path) -> Result<(), CrateExportError> {
    let (headers, rows) = fetch_rows(tab, filter)?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }

    for (row_idx, row) in rows.enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string(excel_row, col as u16, value.as_deref().unwrap_or(""))?;
        }
    }

    worksheet.autofit();
    workbook.save(path)?;
    Ok(())
}

pub fn export(tab: &Tab, filter: &FilterModel, format: ExportFormat, path: &Path) -> Result<(), CrateExportError> {
    match format {
        ExportFormat::Csv => export_csv(tab, filter, path),
        ExportFormat::Tsv => export_tsv(tab, filter, path),
        ExportFormat::Xlsx => export_xlsx(tab, filter, path),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrateExportError {
    #[error("analytics error: {0}")]
    Analytics(#[from] crate::error::AnalyticsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escapes_commas_and_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn tsv_escapes_tabs_and_newlines() {
        assert_eq!(tsv_field("a\tb\nc"), "a b c");
    }
}
