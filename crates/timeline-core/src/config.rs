//! Tunable constants for the ingestion, scheduling, and analytics
//! subsystems. Defaults mirror the numeric constants named throughout the
//! resource model (§5): parser batch size, FTS chunk size, annotation batch
//! width, and the per-analytic row caps.

/// Tunables shared by every subsystem. Constructed once per process (or per
/// test) and threaded through as `&TimelineConfig`.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Row batch size parsers stream from source files. Each batch is
    /// inserted and released immediately; no parser accumulates the full
    /// file in memory.
    pub parser_batch_rows: usize,
    /// Row count per FTS population chunk.
    pub fts_chunk_rows: usize,
    /// Number of row identifiers per bookmark/tag annotation batch, capped
    /// to respect SQLite's host-parameter limit.
    pub annotation_batch_rows: usize,
    /// Row cap for process-tree reconstruction.
    pub process_tree_row_cap: usize,
    /// Row cap for the lateral-movement graph.
    pub lateral_movement_row_cap: usize,
    /// Unique-value cap for stacking.
    pub stacking_value_cap: usize,
    /// Pattern batch size for IOC alternation regexes.
    pub ioc_pattern_batch: usize,
    /// Row page size for IOC hit counting.
    pub ioc_hit_page_rows: usize,
    /// Number of rows sampled to classify numeric/timestamp columns.
    pub column_sample_rows: usize,
    /// Fraction of sampled values that must parse as numbers for a column
    /// to be classified numeric.
    pub numeric_classification_threshold: f64,
    /// Row batch size used by merge when projecting source rows.
    pub merge_batch_rows: usize,
    /// Maximum number of lateral-movement chains returned.
    pub lateral_movement_chain_cap: usize,
    /// Number of records sampled to discover EVTX EventData schema before
    /// finalizing columns.
    pub evtx_schema_sample_records: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            parser_batch_rows: 50_000,
            fts_chunk_rows: 200_000,
            annotation_batch_rows: 5_000,
            process_tree_row_cap: 200_000,
            lateral_movement_row_cap: 500_000,
            stacking_value_cap: 10_000,
            ioc_pattern_batch: 200,
            ioc_hit_page_rows: 500,
            column_sample_rows: 100,
            numeric_classification_threshold: 0.8,
            merge_batch_rows: 50_000,
            lateral_movement_chain_cap: 50,
            evtx_schema_sample_records: 500,
        }
    }
}
