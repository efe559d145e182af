mod support;

use timeline_core::config::TimelineConfig;
use timeline_core::merge::{merge_tabs, MergeSource};
use timeline_core::tab::TabRegistry;

/// Two sources with disjoint non-timestamp columns merge into one tab whose
/// headers are the sorted union plus `_Source`/`datetime`; rows from each
/// source carry empty values for the columns the other source doesn't have.
#[test]
fn heterogeneous_schemas_merge_into_sorted_union_of_columns() {
    let registry = TabRegistry::new();
    let config = TimelineConfig::default();

    let tab_a = support::import_csv("ts,host,eid\n2024-01-01 00:00:01,HOST-A,4624\n");
    let tab_a_id = tab_a.id;
    registry.insert(tab_a);

    let tab_b = support::import_csv("ts,user,eid\n2024-01-01 00:00:02,alice,4625\n");
    let tab_b_id = tab_b.id;
    registry.insert(tab_b);

    let sources = vec![
        MergeSource { tab_id: tab_a_id, display_name: "source-a".to_string(), timestamp_column: "ts".to_string() },
        MergeSource { tab_id: tab_b_id, display_name: "source-b".to_string(), timestamp_column: "ts".to_string() },
    ];

    let merged_id = merge_tabs(&registry, &config, "merged".to_string(), &sources, |_| {}).unwrap();
    let merged = registry.get(merged_id).unwrap();

    assert_eq!(
        merged.headers.original_headers(),
        &["_Source".to_string(), "datetime".to_string(), "eid".to_string(), "host".to_string(), "user".to_string()],
    );
    assert_eq!(merged.store.row_count().unwrap(), 2);

    let conn = merged.store.reader();
    let source_col = merged.headers.safe_for("_Source").unwrap();
    let host_col = merged.headers.safe_for("host").unwrap();
    let user_col = merged.headers.safe_for("user").unwrap();

    let mut stmt = conn.prepare(&format!("SELECT {source_col}, {host_col}, {user_col} FROM rows ORDER BY id")).unwrap();
    let rows: Vec<(String, Option<String>, Option<String>)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(rows[0].0, "source-a");
    assert_eq!(rows[0].1.as_deref(), Some("HOST-A"));
    assert!(rows[0].2.as_deref().is_none_or(str::is_empty));

    assert_eq!(rows[1].0, "source-b");
    assert!(rows[1].1.as_deref().is_none_or(str::is_empty));
    assert_eq!(rows[1].2.as_deref(), Some("alice"));
}
