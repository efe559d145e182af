use std::io::Write;
use timeline_core::config::TimelineConfig;
use timeline_core::tab::Tab;

/// Writes `content` to a temp file with the given extension and imports it
/// synchronously (no scheduler involved) into a fresh `Tab`.
pub fn import_text(content: &str, extension: &str) -> Tab {
    let mut file = tempfile::Builder::new().suffix(&format!(".{extension}")).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = TimelineConfig::default();
    let mut parser = timeline_core::parsers::open(file.path(), None).unwrap();
    let tab = Tab::new("test".to_string(), parser.headers().to_vec()).unwrap();

    while let Some(batch) = parser.next_batch(config.parser_batch_rows).unwrap() {
        tab.store.insert_batch(&batch).unwrap();
    }

    let timestamp_cols = tab.timestamp_columns.read().unwrap().clone();
    let numeric_cols = tab
        .store
        .finalize(config.column_sample_rows, config.numeric_classification_threshold, &timestamp_cols)
        .unwrap();
    tab.set_numeric_columns(numeric_cols);

    tab
}

pub fn import_csv(content: &str) -> Tab {
    import_text(content, "csv")
}
