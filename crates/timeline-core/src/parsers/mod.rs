//! Format parsers (§6): CSV/TSV/PSV, spreadsheets, EVTX, and Plaso
//! super-timelines as variants of one capability set — open, discover
//! headers, stream batches (§9 "Polymorphism of parsers").

pub mod delimited;
pub mod evtx;
pub mod plaso;
pub mod spreadsheet;

use crate::error::{ParseError, ParseResult};
use crate::storage::store::RowBatch;
use std::path::Path;

/// A streaming row source. Headers are fixed once the parser is
/// constructed; rows are pulled in caller-sized batches so nothing holds
/// a whole source file in memory at once.
pub trait SourceParser: Send {
    fn headers(&self) -> &[String];

    /// Returns the next batch of up to `batch_rows` rows, or `None` once
    /// exhausted. Each row has exactly `headers().len()` entries, in
    /// header order, with absent/empty cells as `None`.
    fn next_batch(&mut self, batch_rows: usize) -> ParseResult<Option<RowBatch>>;
}

/// Opens `path` with the parser selected by extension (§6). Spreadsheet
/// workbooks with more than one sheet require `sheet_name` to disambiguate,
/// returning [`ParseError::AmbiguousSheet`] otherwise.
pub fn open(path: &Path, sheet_name: Option<&str>) -> ParseResult<Box<dyn SourceParser>> {
    if !path.exists() {
        return Err(ParseError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "tsv" | "psv" | "txt" | "log" => {
            Ok(Box::new(delimited::DelimitedParser::open(path)?))
        }
        "xlsx" | "xls" | "xlsm" => Ok(Box::new(spreadsheet::SpreadsheetParser::open(path, sheet_name)?)),
        "evtx" => Ok(Box::new(evtx::EvtxParser::open(path)?)),
        "plaso" => Ok(Box::new(plaso::PlasoParser::open(path)?)),
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}
