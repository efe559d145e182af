use timeline_core::filter::{compile, CheckboxFilter, FilterModel, SubstringFilter};

/// No value from a substring or checkbox filter may ever be concatenated
/// into the WHERE text itself; it must only ever appear in the bound
/// parameter list.
#[test]
fn compiled_where_clause_never_contains_a_literal_filter_value() {
    let secret_value = "zzz-needle-4242";
    let mut model = FilterModel::default();
    model.substrings.push(SubstringFilter { column: "c0".to_string(), value: secret_value.to_string() });
    model.checkboxes.push(CheckboxFilter { column: "c1".to_string(), values: vec!["4624".to_string()] });

    let compiled = compile(&model, None);

    assert!(!compiled.where_clause.contains(secret_value));
    assert!(!compiled.where_clause.contains("4624"));
    assert!(compiled.where_clause.contains('?'));

    let has_needle = compiled.params.iter().any(|p| matches!(p, rusqlite::types::Value::Text(t) if t == secret_value));
    assert!(has_needle, "the filter value must still flow through as a bound parameter");
}
