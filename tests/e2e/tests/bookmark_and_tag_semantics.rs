mod support;

#[test]
fn toggle_bookmark_flips_state_each_call() {
    let tab = support::import_csv("a,b\n1,x\n2,y\n");

    assert!(!tab.store.is_bookmarked(1).unwrap());
    assert!(tab.toggle_bookmark(1).unwrap());
    assert!(tab.store.is_bookmarked(1).unwrap());
    assert!(!tab.toggle_bookmark(1).unwrap());
    assert!(!tab.store.is_bookmarked(1).unwrap());
    assert_eq!(tab.store.bookmarked_row_ids().unwrap(), Vec::<i64>::new());
}

#[test]
fn adding_the_same_tag_twice_produces_one_entry() {
    let tab = support::import_csv("a,b\n1,x\n2,y\n");

    tab.add_tag(1, "suspicious").unwrap();
    tab.add_tag(1, "suspicious").unwrap();

    assert_eq!(tab.store.tags_for_row(1).unwrap(), vec!["suspicious".to_string()]);
    assert_eq!(tab.store.distinct_tag_labels().unwrap(), vec!["suspicious".to_string()]);

    tab.remove_tag(1, "suspicious").unwrap();
    assert!(tab.store.tags_for_row(1).unwrap().is_empty());
}

#[test]
fn mutations_no_op_while_a_background_build_is_in_flight() {
    let tab = support::import_csv("a,b\n1,x\n2,y\n");
    tab.set_building(true);

    assert!(!tab.toggle_bookmark(1).unwrap());
    assert!(!tab.store.is_bookmarked(1).unwrap());

    tab.add_tag(1, "suspicious").unwrap();
    assert!(tab.store.tags_for_row(1).unwrap().is_empty());

    tab.set_bookmarks(&[1, 2]).unwrap();
    assert_eq!(tab.store.bookmarked_row_ids().unwrap(), Vec::<i64>::new());

    tab.set_building(false);
    assert!(tab.toggle_bookmark(1).unwrap());
    assert!(tab.store.is_bookmarked(1).unwrap());
}
