//! Crate-wide error types.
//!
//! Each subsystem gets its own `thiserror`-derived error enum so callers can
//! match on the failure mode that actually matters to them (an intake error
//! is handled very differently from a query-compilation error, per the
//! recovery policy). [`CoreError`] aggregates subsystems for operations that
//! cross a boundary, such as import (parsing feeding storage).

use std::path::PathBuf;

/// Storage-layer failures: opening/configuring the scratch store, bulk
/// insert, index/FTS build, bookmark/tag mutation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tab not found: {0}")]
    TabNotFound(String),
    #[error("tab {0} is busy (background build in progress)")]
    TabBusy(String),
    #[error("init error: {0}")]
    Init(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Intake failures: unreadable files, unsupported formats, malformed
/// headers, malformed Plaso databases.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(String),
    #[error("header row absent or empty")]
    MissingHeader,
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("workbook has no data")]
    EmptyWorkbook,
    #[error("workbook has multiple sheets; caller must choose one")]
    AmbiguousSheet(Vec<String>),
    #[error("evtx error: {0}")]
    Evtx(String),
    #[error("invalid plaso database: {0}")]
    InvalidPlaso(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Filter-compilation failures degrade the offending condition to
/// "match nothing" rather than aborting the whole query (see spec §7).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
}

pub type FilterResult<T> = std::result::Result<T, FilterError>;

/// Analytics failures. Resource-limit hits are not represented here; they
/// are surfaced as a `truncated` flag on the result, never an error.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("column not found: {0}")]
    UnknownColumn(String),
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

/// Top-level error aggregating every subsystem, used by operations (import,
/// merge, session restore) that span more than one boundary.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
