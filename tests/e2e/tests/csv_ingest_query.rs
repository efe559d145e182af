mod support;

use timeline_core::filter::FilterModel;
use timeline_core::query::{windowed_fetch, SortDirection, SortSpec};

#[test]
fn windowed_query_returns_rows_in_ascending_timestamp_order() {
    let tab = support::import_csv("timestamp,computer,event\n2024-01-01 00:00:01,HOST,4624\n2024-01-01 00:00:02,HOST,4625\n");

    let sort = SortSpec { column: "c0".to_string(), direction: SortDirection::Asc };
    let response = windowed_fetch(&tab, &FilterModel::default(), Some(&sort), 0, 10, 5_000).unwrap();

    assert_eq!(response.total_filtered, 2);
    assert_eq!(response.rows.len(), 2);
    assert_eq!(response.rows[0].values[2].as_deref(), Some("4624"));
    assert_eq!(response.rows[1].values[2].as_deref(), Some("4625"));
}

#[test]
fn row_identifiers_are_dense_and_monotonic() {
    let tab = support::import_csv("a,b\n1,x\n2,y\n3,z\n");
    let response = windowed_fetch(&tab, &FilterModel::default(), None, 0, 100, 5_000).unwrap();
    let ids: Vec<i64> = response.rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn count_cache_matches_fresh_count() {
    let tab = support::import_csv("a,b\n1,x\n2,y\n3,z\n");
    let filter = FilterModel::default();
    let first = timeline_core::query::count_filtered(&tab, &filter).unwrap();
    let second = timeline_core::query::count_filtered(&tab, &filter).unwrap();
    assert_eq!(first, 3);
    assert_eq!(first, second);
}
