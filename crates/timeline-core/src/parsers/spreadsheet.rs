//! XLSX/XLS/XLSM parser (§6). Ambiguous multi-sheet workbooks bounce back
//! to the caller via [`ParseError::AmbiguousSheet`] so it can ask the user
//! which sheet to import.

use super::SourceParser;
use crate::error::{ParseError, ParseResult};
use crate::storage::store::RowBatch;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

fn cell_to_header(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        other => Some(other.to_string()),
    }
}

pub struct SpreadsheetParser {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    cursor: usize,
}

impl SpreadsheetParser {
    pub fn open(path: &Path, sheet_name: Option<&str>) -> ParseResult<Self> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
        let sheet_names = workbook.sheet_names().to_vec();

        let sheet = match sheet_name {
            Some(name) => name.to_string(),
            None => match sheet_names.len() {
                0 => return Err(ParseError::EmptyWorkbook),
                1 => sheet_names[0].clone(),
                _ => return Err(ParseError::AmbiguousSheet(sheet_names)),
            },
        };

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter.next().ok_or(ParseError::EmptyWorkbook)?;
        let headers: Vec<String> = header_row.iter().map(cell_to_header).collect();
        if headers.is_empty() {
            return Err(ParseError::MissingHeader);
        }

        let rows: Vec<Vec<Option<String>>> = rows_iter
            .map(|row| (0..headers.len()).map(|i| row.get(i).and_then(cell_to_value)).collect())
            .collect();

        Ok(Self { headers, rows, cursor: 0 })
    }
}

impl SourceParser for SpreadsheetParser {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_batch(&mut self, batch_rows: usize) -> ParseResult<Option<RowBatch>> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_rows).min(self.rows.len());
        let batch = self.rows[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Some(batch))
    }
}
