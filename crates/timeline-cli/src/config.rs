//! TOML config file + environment variable overlay on top of
//! [`timeline_core::TimelineConfig`]'s defaults.

use serde::Deserialize;
use timeline_core::TimelineConfig;

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    parser_batch_rows: Option<usize>,
    fts_chunk_rows: Option<usize>,
    annotation_batch_rows: Option<usize>,
    process_tree_row_cap: Option<usize>,
    lateral_movement_row_cap: Option<usize>,
    stacking_value_cap: Option<usize>,
    ioc_pattern_batch: Option<usize>,
    ioc_hit_page_rows: Option<usize>,
    column_sample_rows: Option<usize>,
    numeric_classification_threshold: Option<f64>,
    merge_batch_rows: Option<usize>,
    lateral_movement_chain_cap: Option<usize>,
    evtx_schema_sample_records: Option<usize>,
}

fn apply(base: &mut TimelineConfig, partial: PartialConfig) {
    if let Some(v) = partial.parser_batch_rows {
        base.parser_batch_rows = v;
    }
    if let Some(v) = partial.fts_chunk_rows {
        base.fts_chunk_rows = v;
    }
    if let Some(v) = partial.annotation_batch_rows {
        base.annotation_batch_rows = v;
    }
    if let Some(v) = partial.process_tree_row_cap {
        base.process_tree_row_cap = v;
    }
    if let Some(v) = partial.lateral_movement_row_cap {
        base.lateral_movement_row_cap = v;
    }
    if let Some(v) = partial.stacking_value_cap {
        base.stacking_value_cap = v;
    }
    if let Some(v) = partial.ioc_pattern_batch {
        base.ioc_pattern_batch = v;
    }
    if let Some(v) = partial.ioc_hit_page_rows {
        base.ioc_hit_page_rows = v;
    }
    if let Some(v) = partial.column_sample_rows {
        base.column_sample_rows = v;
    }
    if let Some(v) = partial.numeric_classification_threshold {
        base.numeric_classification_threshold = v;
    }
    if let Some(v) = partial.merge_batch_rows {
        base.merge_batch_rows = v;
    }
    if let Some(v) = partial.lateral_movement_chain_cap {
        base.lateral_movement_chain_cap = v;
    }
    if let Some(v) = partial.evtx_schema_sample_records {
        base.evtx_schema_sample_records = v;
    }
}

/// Loads `path` (if given and present), then `TIMELINE_*` environment
/// overrides, on top of `TimelineConfig::default()`.
pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<TimelineConfig> {
    let mut config = TimelineConfig::default();

    if let Some(path) = path {
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let partial: PartialConfig = toml::from_str(&text)?;
            apply(&mut config, partial);
        }
    }

    if let Ok(v) = std::env::var("TIMELINE_PARSER_BATCH_ROWS") {
        config.parser_batch_rows = v.parse()?;
    }
    if let Ok(v) = std::env::var("TIMELINE_FTS_CHUNK_ROWS") {
        config.fts_chunk_rows = v.parse()?;
    }

    Ok(config)
}
