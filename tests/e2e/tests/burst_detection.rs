mod support;

use std::fmt::Write as _;
use timeline_core::analytics::bursts::burst_analysis;
use timeline_core::filter::FilterModel;

#[test]
fn sustained_baseline_then_one_burst_minute() {
    let mut csv = String::from("ts,event\n");
    for minute in 0..19 {
        for second in 0..5 {
            let _ = writeln!(csv, "2024-01-01 00:{minute:02}:{second:02},tick");
        }
    }
    for second in 0..60 {
        let _ = writeln!(csv, "2024-01-01 00:19:{second:02},tick");
    }

    let tab = support::import_csv(&csv);
    let result = burst_analysis(&tab, &FilterModel::default(), "c0", 1, 5.0).unwrap();

    assert_eq!(result.baseline, 5.0);
    assert_eq!(result.periods.len(), 1);
    let burst = &result.periods[0];
    assert_eq!(burst.event_count, 60);
    assert_eq!(burst.burst_factor, 12.0);
    assert_eq!(burst.window_count, 1);
}
