//! # Timeline Core
//!
//! Forensic timeline ingestion, storage, and analytics engine for Windows
//! DFIR artifacts. Loads heterogeneous sources — delimited text, Excel
//! workbooks, Windows event logs, Plaso super-timelines — into per-file
//! "tabs" backed by an embedded relational store, then serves filtered,
//! sorted, and searched views over them without ever materializing a
//! whole file's rows in memory at once.
//!
//! ## Layout
//!
//! - [`tab`]: the unit of isolated storage for one imported file, and the
//!   registry that owns every open tab.
//! - [`storage`]: the embedded store itself — schema, scalar-function
//!   registry, sort-index and full-text-index builders, bookmark/tag
//!   tables.
//! - [`parsers`]: format-specific row sources behind one streaming trait.
//! - [`intake`]: wires a parser to a tab and to the [`scheduler`].
//! - [`scheduler`]: the FIFO import queue and deferred index/FTS build
//!   policy.
//! - [`filter`] / [`search`] / [`query`]: filter compilation, search-mode
//!   compilation, and the windowed fetch / grouping / unique-value API
//!   built on top of both.
//! - [`analytics`]: histogram, gap, burst, coverage, value-stacking, and
//!   IOC-matching passes over a tab's filtered rows.
//! - [`processtree`] / [`lateral`] / [`persistence`]: the three DFIR-specific
//!   reconstructions — process ancestry, lateral-movement graphs and RDP
//!   session correlation, and persistence-mechanism scanning.
//! - [`merge`]: projects several tabs into one combined timeline.
//! - [`session`]: saves and restores the set of open tabs as JSON.
//! - [`export`] / [`report`]: CSV/TSV/XLSX export and a self-contained HTML
//!   report over a tab's filtered rows.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use timeline_core::config::TimelineConfig;
//! use timeline_core::intake::{stage, import_one, IntakeRequest};
//! use timeline_core::scheduler::Scheduler;
//! use timeline_core::tab::TabRegistry;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn run() -> timeline_core::error::Result<()> {
//! let registry = Arc::new(TabRegistry::new());
//! let config = TimelineConfig::default();
//! let request = IntakeRequest { name: "events".into(), path: PathBuf::from("events.csv"), sheet_name: None };
//! let tab_id = stage(&registry, &request)?;
//!
//! let scheduler = Scheduler::new(registry.clone(), config.clone());
//! scheduler.enqueue_import(tab_id);
//! scheduler
//!     .drain(|id| {
//!         let registry = registry.clone();
//!         let config = config.clone();
//!         let path = request.path.clone();
//!         async move { import_one(&registry, &config, id, &path, None).await }
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod intake;
pub mod lateral;
pub mod merge;
pub mod parsers;
pub mod persistence;
pub mod processtree;
pub mod query;
pub mod report;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod storage;
pub mod tab;

pub use config::TimelineConfig;
pub use error::{CoreError, Result};
pub use filter::FilterModel;
pub use tab::{Tab, TabId, TabRegistry};

/// Crate version, for surfacing in CLI `--version` output and session
/// file metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::config::TimelineConfig;
    pub use crate::error::{CoreError, Result};
    pub use crate::filter::FilterModel;
    pub use crate::intake::{import_one, stage, IntakeRequest};
    pub use crate::query::{count_filtered, windowed_fetch, QueryResponse, RowResult, SortDirection, SortSpec};
    pub use crate::scheduler::{ImportOutcome, Scheduler, SchedulerEvent};
    pub use crate::tab::{Tab, TabId, TabRegistry};
}
