mod support;

use timeline_core::config::TimelineConfig;
use timeline_core::merge::{merge_tabs, MergeSource};
use timeline_core::tab::TabRegistry;

/// Merging a single source is a pure relabeling: row count is unchanged
/// and every row's `_Source` equals the source's display name.
#[test]
fn single_source_merge_preserves_row_count_and_tags_every_row() {
    let registry = TabRegistry::new();
    let config = TimelineConfig::default();

    let tab = support::import_csv("ts,host\n2024-01-01 00:00:01,HOST-A\n2024-01-01 00:00:02,HOST-B\n2024-01-01 00:00:03,HOST-C\n");
    let tab_id = tab.id;
    let original_count = tab.store.row_count().unwrap();
    registry.insert(tab);

    let sources = vec![MergeSource { tab_id, display_name: "only-source".to_string(), timestamp_column: "ts".to_string() }];
    let merged_id = merge_tabs(&registry, &config, "merged".to_string(), &sources, |_| {}).unwrap();
    let merged = registry.get(merged_id).unwrap();

    assert_eq!(merged.store.row_count().unwrap(), original_count);

    let conn = merged.store.reader();
    let source_col = merged.headers.safe_for("_Source").unwrap();
    let mut stmt = conn.prepare(&format!("SELECT DISTINCT {source_col} FROM rows")).unwrap();
    let names: Vec<String> = stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(names, vec!["only-source".to_string()]);
}
