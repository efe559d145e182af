mod support;

use timeline_core::filter::FilterModel;
use timeline_core::processtree::reconstruct;

/// Pid is reused: a process with pid 100 starts at T1, exits, and a second
/// unrelated process reuses pid 100 at T3. A child spawned at T2 (between
/// the two) with ppid 100 must link to the T1 instance, never T3, since
/// T3 postdates the child and can't be its parent.
#[test]
fn child_links_to_the_pid_instance_alive_at_spawn_time_not_a_later_reuse() {
    let csv = "timestamp,pid,ppid,image\n\
               2024-01-01 00:00:01,100,10,first.exe\n\
               2024-01-01 00:00:02,200,100,child.exe\n\
               2024-01-01 00:00:03,100,20,second.exe\n";
    let tab = support::import_csv(csv);

    let result = reconstruct(&tab, &FilterModel::default(), 10_000).unwrap();
    assert_eq!(result.stats.total, 3);

    let first_instance = result.nodes.iter().find(|n| n.image.as_deref() == Some("first.exe")).unwrap();
    let second_instance = result.nodes.iter().find(|n| n.image.as_deref() == Some("second.exe")).unwrap();
    let child = result.nodes.iter().find(|n| n.image.as_deref() == Some("child.exe")).unwrap();

    assert_eq!(child.parent_key.as_deref(), Some(first_instance.key.as_str()));
    assert_ne!(child.parent_key.as_deref(), Some(second_instance.key.as_str()));
}
