//! Plaso super-timeline parser (§6): validates the `metadata` table's
//! `format_version`/`compression_format`, then projects the `event` +
//! `event_data` join into `datetime, timestamp_desc, data_type` plus the
//! JSON attribute keys discovered over the first 500 rows.

use super::SourceParser;
use crate::error::{ParseError, ParseResult};
use crate::storage::store::RowBatch;
use flate2::read::ZlibDecoder;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

const ATTRIBUTE_SAMPLE_ROWS: usize = 500;

struct RawEvent {
    timestamp_micros: i64,
    timestamp_desc: Option<String>,
    data_type: Option<String>,
    attributes: Value,
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub struct PlasoParser {
    headers: Vec<String>,
    attribute_keys: Vec<String>,
    events: Vec<RawEvent>,
    cursor: usize,
}

impl PlasoParser {
    pub fn open(path: &Path) -> ParseResult<Self> {
        let conn = Connection::open(path)?;

        let (format_version, compression_format): (String, String) = conn
            .query_row("SELECT format_version, compression_format FROM metadata", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .map_err(|_| ParseError::InvalidPlaso("missing or unreadable metadata table".into()))?;
        if format_version.trim().is_empty() {
            return Err(ParseError::InvalidPlaso("empty format_version".into()));
        }
        let zlib = compression_format.eq_ignore_ascii_case("zlib");

        let mut stmt = conn
            .prepare(
                "SELECT event.timestamp, event.timestamp_desc, event_data.data_type, event_data.data \
                 FROM event JOIN event_data ON event.event_data_rowid = event_data.id",
            )
            .map_err(|e| ParseError::InvalidPlaso(format!("unexpected event/event_data schema: {e}")))?;

        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut events = Vec::new();
        let mut attribute_keys = BTreeSet::new();
        for (idx, row) in rows.enumerate() {
            let (timestamp_micros, timestamp_desc, data_type, blob) = row?;
            let decoded = if zlib {
                let mut decoder = ZlibDecoder::new(&blob[..]);
                let mut out = String::new();
                decoder
                    .read_to_string(&mut out)
                    .map_err(|e| ParseError::InvalidPlaso(format!("zlib decode failed: {e}")))?;
                out
            } else {
                String::from_utf8_lossy(&blob).into_owned()
            };
            let attributes: Value = serde_json::from_str(&decoded).unwrap_or(Value::Null);
            if idx < ATTRIBUTE_SAMPLE_ROWS {
                if let Some(map) = attributes.as_object() {
                    attribute_keys.extend(map.keys().cloned());
                }
            }
            events.push(RawEvent { timestamp_micros, timestamp_desc, data_type, attributes });
        }

        let attribute_keys: Vec<String> = attribute_keys.into_iter().collect();
        let mut headers = vec!["datetime".to_string(), "timestamp_desc".to_string(), "data_type".to_string()];
        headers.extend(attribute_keys.iter().cloned());

        Ok(Self { headers, attribute_keys, events, cursor: 0 })
    }

    fn project(&self, event: &RawEvent) -> Vec<Option<String>> {
        let datetime = chrono::DateTime::from_timestamp_micros(event.timestamp_micros).map(|dt| dt.to_rfc3339());
        let mut row = vec![datetime, event.timestamp_desc.clone(), event.data_type.clone()];
        let object = event.attributes.as_object();
        for key in &self.attribute_keys {
            row.push(object.and_then(|m| m.get(key)).and_then(scalar_to_string));
        }
        row
    }
}

impl SourceParser for PlasoParser {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_batch(&mut self, batch_rows: usize) -> ParseResult<Option<RowBatch>> {
        if self.cursor >= self.events.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_rows).min(self.events.len());
        let batch = self.events[self.cursor..end].iter().map(|e| self.project(e)).collect();
        self.cursor = end;
        Ok(Some(batch))
    }
}
