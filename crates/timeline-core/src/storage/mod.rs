//! Tab store: an ordered multi-column string table with secondary indexes,
//! backed by one embedded SQLite database per tab (§4.1).

pub mod functions;
pub mod migrations;
pub mod store;
pub mod temporal;

pub use store::{RowBatch, TabStore};
