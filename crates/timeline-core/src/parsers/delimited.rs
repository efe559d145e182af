//! CSV/TSV/PSV parser (§6): RFC 4180 quoting, delimiter auto-detected from
//! the first line by counting tabs, pipes, and commas in that priority
//! order. Headers are the first non-empty line; blank lines are skipped.

use super::SourceParser;
use crate::error::{ParseError, ParseResult};
use crate::storage::store::RowBatch;
use std::io::{BufRead, BufReader};
use std::path::Path;

fn detect_delimiter(first_line: &str) -> u8 {
    let tabs = first_line.matches('\t').count();
    let pipes = first_line.matches('|').count();
    let commas = first_line.matches(',').count();
    if tabs > 0 && tabs >= pipes && tabs >= commas {
        b'\t'
    } else if pipes > 0 && pipes >= commas {
        b'|'
    } else {
        b','
    }
}

fn first_non_empty_line(path: &Path) -> ParseResult<String> {
    let file = std::fs::File::open(path)?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
    Err(ParseError::MissingHeader)
}

pub struct DelimitedParser {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<std::fs::File>,
}

impl DelimitedParser {
    pub fn open(path: &Path) -> ParseResult<Self> {
        let probe_line = first_non_empty_line(path)?;
        let delimiter = detect_delimiter(&probe_line);

        let file = std::fs::File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(file);

        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ParseError::MissingHeader);
        }

        Ok(Self {
            headers,
            records: reader.into_records(),
        })
    }
}

impl SourceParser for DelimitedParser {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_batch(&mut self, batch_rows: usize) -> ParseResult<Option<RowBatch>> {
        let mut batch = Vec::with_capacity(batch_rows);
        for _ in 0..batch_rows {
            match self.records.next() {
                Some(Ok(record)) => {
                    let row = (0..self.headers.len())
                        .map(|i| record.get(i).map(str::to_string).filter(|s| !s.is_empty()))
                        .collect();
                    batch.push(row);
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str, ext: &str) -> tempfile::TempPath {
        let mut file = tempfile::Builder::new().suffix(ext).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn detects_tab_over_comma() {
        assert_eq!(detect_delimiter("a\tb,c\td"), b'\t');
    }

    #[test]
    fn detects_pipe_over_comma() {
        assert_eq!(detect_delimiter("a|b,c"), b'|');
    }

    #[test]
    fn defaults_to_comma() {
        assert_eq!(detect_delimiter("a,b,c"), b',');
    }

    #[test]
    fn streams_csv_rows_in_batches() {
        let path = write_temp("Time,Computer,Event\n2024-01-01,HOST,4624\n2024-01-02,HOST,4625\n", ".csv");
        let mut parser = DelimitedParser::open(&path).unwrap();
        assert_eq!(parser.headers(), &["Time", "Computer", "Event"]);
        let batch = parser.next_batch(1).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        let batch = parser.next_batch(10).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(parser.next_batch(10).unwrap().is_none());
    }

    #[test]
    fn missing_header_row_is_an_error() {
        let path = write_temp("", ".csv");
        assert!(matches!(DelimitedParser::open(&path), Err(ParseError::MissingHeader)));
    }
}
