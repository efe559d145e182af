mod support;

use timeline_core::config::TimelineConfig;
use timeline_core::export::{export, ExportFormat};
use timeline_core::filter::FilterModel;
use timeline_core::tab::Tab;

#[test]
fn csv_export_then_reimport_preserves_row_count_and_text_columns() {
    let tab = support::import_csv("computer,event,note\nHOST-A,4624,first login\nHOST-B,4625,failed logon\n");

    let out = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    export(&tab, &FilterModel::default(), ExportFormat::Csv, out.path()).unwrap();

    let config = TimelineConfig::default();
    let mut parser = timeline_core::parsers::open(out.path(), None).unwrap();
    let reimported = Tab::new("reimported".to_string(), parser.headers().to_vec()).unwrap();
    while let Some(batch) = parser.next_batch(config.parser_batch_rows).unwrap() {
        reimported.store.insert_batch(&batch).unwrap();
    }

    assert_eq!(reimported.store.row_count().unwrap(), tab.store.row_count().unwrap());
    assert_eq!(reimported.headers.original_headers(), tab.headers.original_headers());

    let conn = reimported.store.reader();
    let note_col = reimported.headers.safe_for("note").unwrap();
    let mut stmt = conn.prepare(&format!("SELECT {note_col} FROM rows ORDER BY id")).unwrap();
    let notes: Vec<String> = stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(notes, vec!["first login".to_string(), "failed logon".to_string()]);
}
