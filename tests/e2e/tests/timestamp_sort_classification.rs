mod support;

use timeline_core::filter::FilterModel;
use timeline_core::query::{windowed_fetch, SortDirection, SortSpec};

#[test]
fn ambiguous_date_column_classifies_as_timestamp_not_numeric() {
    let tab = support::import_csv("date,note\n2025-01-01,a\n2024-12-31,b\n");

    assert!(tab.is_timestamp_column("c0"), "column named 'date' should be header-classified as a timestamp");
    assert!(!tab.is_numeric_column("c0"), "a timestamp column must never also classify as numeric");

    let sort = SortSpec { column: "c0".to_string(), direction: SortDirection::Asc };
    let response = windowed_fetch(&tab, &FilterModel::default(), Some(&sort), 0, 10, 5_000).unwrap();

    assert_eq!(response.rows[0].values[0].as_deref(), Some("2024-12-31"));
    assert_eq!(response.rows[1].values[0].as_deref(), Some("2025-01-01"));
}
