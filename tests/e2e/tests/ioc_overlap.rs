mod support;

use timeline_core::analytics::ioc::ioc_match;
use timeline_core::filter::FilterModel;

/// A single row containing two distinct indicators must be counted once
/// per pattern but surfaced as one matched row, not two.
#[test]
fn overlapping_patterns_in_one_row_count_independently_but_match_once() {
    let tab = support::import_csv(
        "timestamp,command\n\
         2024-01-01 00:00:01,cmd.exe /c powershell -enc AAAA\n\
         2024-01-01 00:00:02,notepad.exe\n",
    );

    let patterns = vec!["cmd.exe".to_string(), "powershell".to_string()];
    let result = ioc_match(&tab, &FilterModel::default(), &patterns, 200, 500).unwrap();

    assert_eq!(result.matched_row_ids.len(), 1);
    assert_eq!(result.pattern_counts.get("cmd.exe"), Some(&1));
    assert_eq!(result.pattern_counts.get("powershell"), Some(&1));
}
