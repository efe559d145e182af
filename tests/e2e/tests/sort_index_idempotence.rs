mod support;

#[test]
fn ensure_sort_index_is_idempotent() {
    let tab = support::import_csv("a,b\n1,x\n2,y\n3,z\n");

    assert!(!tab.store.has_sort_index("c0"));
    tab.store.ensure_sort_index("c0").unwrap();
    assert!(tab.store.has_sort_index("c0"));
    tab.store.ensure_sort_index("c0").unwrap();
    assert!(tab.store.has_sort_index("c0"));
}
