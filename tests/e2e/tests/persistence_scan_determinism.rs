mod support;

use timeline_core::filter::FilterModel;
use timeline_core::persistence::{detect_mode, scan_event_log, ScanMode};

#[test]
fn scanning_the_same_input_twice_yields_identical_ordered_findings() {
    let tab = support::import_csv(
        "EventID,Channel,Message\n\
         7045,System,Service Name: EvilSvc|Service File Name: C:\\Windows\\Temp\\evil.exe\n\
         4624,Security,An account was successfully logged on\n",
    );

    assert_eq!(detect_mode(&tab), Some(ScanMode::EventLog));

    let first = scan_event_log(&tab, &FilterModel::default(), &[], &[]).unwrap();
    let second = scan_event_log(&tab, &FilterModel::default(), &[], &[]).unwrap();

    assert!(!first.is_empty());
    assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
}
