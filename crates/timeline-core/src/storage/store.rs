//! The per-tab embedded relational store (§4.1).
//!
//! Uses separate writer/reader connections for interior mutability, the
//! same shape the teacher engine uses for its single long-lived database —
//! here each tab gets its own short-lived file instead. All methods take
//! `&self`, making `TabStore` `Send + Sync` so the scheduler can hold it
//! behind an `Arc` rather than an `Arc<Mutex<..>>`.

use crate::error::StorageResult;
use crate::tab::HeaderMap;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use super::{functions, migrations};

/// A batch of rows ready for insertion: one `Vec<Option<String>>` per row,
/// column order matching the tab's safe-column order. The caller owns this
/// layout; the store never builds intermediate per-row objects in the hot
/// path.
pub type RowBatch = Vec<Vec<Option<String>>>;

/// SQLite's default compiled-in limit on host parameters per statement.
const SQLITE_MAX_VARIABLE_NUMBER: usize = 32_766;

pub struct TabStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
    safe_columns: Vec<String>,
    indexed_columns: Mutex<HashSet<String>>,
    fts_built: Mutex<bool>,
    count_cache: Mutex<Option<(String, i64)>>,
}

fn open_configured(path: &std::path::Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;
    functions::register_all(&conn)?;
    Ok(conn)
}

impl TabStore {
    /// Create tab (§4.1): allocates a fresh scratch backing file, applies
    /// bulk-insert pragmas, and builds the row/bookmarks/tags/color-rules
    /// tables. Headers are assumed already sanitized by [`HeaderMap`].
    pub fn create(headers: &HeaderMap) -> StorageResult<Self> {
        let dir = std::env::temp_dir().join("timeline-tabs");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.db", uuid::Uuid::new_v4()));

        let writer = open_configured(&path)?;
        migrations::apply_bulk_insert_pragmas(&writer)?;
        migrations::create_tab_schema(&writer, headers.safe_columns())?;

        let reader = open_configured(&path)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path,
            safe_columns: headers.safe_columns().to_vec(),
            indexed_columns: Mutex::new(HashSet::new()),
            fts_built: Mutex::new(false),
            count_cache: Mutex::new(None),
        })
    }

    pub fn safe_columns(&self) -> &[String] {
        &self.safe_columns
    }

    /// Insert batch (§4.1): one transaction, multi-row `INSERT` sized to
    /// the largest multiple of the column count that fits the host
    /// parameter limit, with the remainder finished by single-row inserts.
    /// Row identifiers are assigned in call order and are never reused.
    pub fn insert_batch(&self, batch: &RowBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ncols = self.safe_columns.len();
        if ncols == 0 {
            let conn = self.writer.lock().unwrap();
            let tx = conn.unchecked_transaction()?;
            for _ in batch {
                tx.execute("INSERT INTO rows DEFAULT VALUES", [])?;
            }
            tx.commit()?;
            drop(conn);
            self.invalidate_count_cache();
            return Ok(());
        }

        let rows_per_insert = (SQLITE_MAX_VARIABLE_NUMBER / ncols).max(1);
        let col_list = self.safe_columns.join(", ");

        let mut conn = self.writer.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut idx = 0;
            while idx + rows_per_insert <= batch.len() {
                let chunk = &batch[idx..idx + rows_per_insert];
                let placeholders = std::iter::repeat(format!("({})", vec!["?"; ncols].join(", ")))
                    .take(chunk.len())
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!("INSERT INTO rows ({col_list}) VALUES {placeholders}");
                let mut stmt = tx.prepare_cached(&sql)?;
                let flat: Vec<&dyn rusqlite::ToSql> = chunk
                    .iter()
                    .flat_map(|row| row.iter().map(|v| v as &dyn rusqlite::ToSql))
                    .collect();
                stmt.execute(params_from_iter(flat))?;
                idx += rows_per_insert;
            }
            if idx < batch.len() {
                let placeholders = format!("({})", vec!["?"; ncols].join(", "));
                let sql = format!("INSERT INTO rows ({col_list}) VALUES {placeholders}");
                let mut stmt = tx.prepare_cached(&sql)?;
                for row in &batch[idx..] {
                    let flat: Vec<&dyn rusqlite::ToSql> =
                        row.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
                    stmt.execute(params_from_iter(flat))?;
                }
            }
        }
        tx.commit()?;
        drop(conn);

        self.invalidate_count_cache();
        Ok(())
    }

    /// Finalize (§4.1): samples the first N rows to classify numeric
    /// columns (timestamp columns are excluded from the test, per §3, so a
    /// date like `2026-01-17` can't be misread as the year 2026), then
    /// switches to query-mode pragmas. Index and FTS builds are deferred.
    pub fn finalize(
        &self,
        sample_rows: usize,
        numeric_threshold: f64,
        timestamp_columns: &[String],
    ) -> StorageResult<Vec<String>> {
        let conn = self.reader.lock().unwrap();
        let mut numeric_columns = Vec::new();
        for col in &self.safe_columns {
            if timestamp_columns.iter().any(|c| c == col) {
                continue;
            }
            let sql = format!(
                "SELECT {col} FROM rows WHERE {col} IS NOT NULL AND {col} != '' LIMIT {sample_rows}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let values: Vec<String> = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .collect();
            if values.is_empty() {
                continue;
            }
            let numeric_count = values.iter().filter(|v| v.trim().parse::<f64>().is_ok()).count();
            if (numeric_count as f64 / values.len() as f64) >= numeric_threshold {
                numeric_columns.push(col.clone());
            }
        }
        drop(conn);

        let writer = self.writer.lock().unwrap();
        migrations::apply_query_mode_pragmas(&writer)?;
        Ok(numeric_columns)
    }

    /// Build sort index (background, §4.1): one B-tree index per column.
    /// `yield_fn` is called between columns so the caller's cooperative
    /// executor can interleave other work; it returns `false` if the tab
    /// was closed mid-build and the build should stop.
    pub async fn build_sort_indexes<F, Fut>(&self, mut yield_between: F) -> StorageResult<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for col in &self.safe_columns {
            {
                let writer = self.writer.lock().unwrap();
                writer.execute(&migrations::create_column_index_sql(col), [])?;
            }
            self.indexed_columns.lock().unwrap().insert(col.clone());
            tracing::debug!(column = %col, "sort index built");
            if !yield_between().await {
                return Ok(());
            }
        }
        let writer = self.writer.lock().unwrap();
        writer.execute_batch("ANALYZE;")?;
        migrations::apply_query_mode_pragmas(&writer)?;
        Ok(())
    }

    pub fn has_sort_index(&self, safe_col: &str) -> bool {
        self.indexed_columns.lock().unwrap().contains(safe_col)
    }

    /// Lazily builds a single column's sort index on first use, matching
    /// the query engine's lazy-sort contract (§4.4).
    pub fn ensure_sort_index(&self, safe_col: &str) -> StorageResult<()> {
        if self.has_sort_index(safe_col) {
            return Ok(());
        }
        let writer = self.writer.lock().unwrap();
        writer.execute(&migrations::create_column_index_sql(safe_col), [])?;
        drop(writer);
        self.indexed_columns.lock().unwrap().insert(safe_col.to_string());
        Ok(())
    }

    /// Build FTS (background, §4.1): populates `rows_fts` in chunks,
    /// yielding between chunks. Readiness is [`TabStore::fts_ready`].
    pub async fn build_fts<F, Fut>(&self, chunk_rows: usize, mut yield_between: F) -> StorageResult<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        {
            let writer = self.writer.lock().unwrap();
            writer.execute(&migrations::create_fts_table_sql(&self.safe_columns), [])?;
        }

        let total: i64 = {
            let reader = self.reader.lock().unwrap();
            reader.query_row("SELECT COUNT(*) FROM rows", [], |r| r.get(0))?
        };

        let mut offset: i64 = 0;
        while offset < total {
            {
                let writer = self.writer.lock().unwrap();
                let col_list = self.safe_columns.join(", ");
                let sql = format!(
                    "INSERT INTO rows_fts(rowid, {col_list}) SELECT id, {col_list} FROM rows ORDER BY id LIMIT {chunk_rows} OFFSET {offset}"
                );
                writer.execute(&sql, [])?;
            }
            offset += chunk_rows as i64;
            tracing::debug!(offset, total, "fts chunk populated");
            if !yield_between().await {
                return Ok(());
            }
        }
        *self.fts_built.lock().unwrap() = true;
        Ok(())
    }

    pub fn fts_is_built(&self) -> bool {
        *self.fts_built.lock().unwrap()
    }

    /// Close tab (§4.1): optimize, close, delete backing files. No error is
    /// fatal.
    pub fn close(&self) -> StorageResult<()> {
        if let Ok(writer) = self.writer.lock() {
            let _ = writer.execute_batch("PRAGMA optimize;");
        }
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.path.with_extension("db-shm"));
        let _ = std::fs::remove_file(self.path.with_extension("db-journal"));
        Ok(())
    }

    pub fn reader(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.reader.lock().unwrap()
    }

    pub fn writer(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.writer.lock().unwrap()
    }

    // ---- bookmarks -------------------------------------------------

    pub fn toggle_bookmark(&self, row_id: i64) -> StorageResult<bool> {
        let writer = self.writer.lock().unwrap();
        let existing: Option<i64> = writer
            .query_row("SELECT row_id FROM bookmarks WHERE row_id = ?1", [row_id], |r| r.get(0))
            .optional()?;
        let now_bookmarked = if existing.is_some() {
            writer.execute("DELETE FROM bookmarks WHERE row_id = ?1", [row_id])?;
            false
        } else {
            writer.execute("INSERT OR IGNORE INTO bookmarks(row_id) VALUES (?1)", [row_id])?;
            true
        };
        drop(writer);
        self.invalidate_count_cache();
        Ok(now_bookmarked)
    }

    pub fn is_bookmarked(&self, row_id: i64) -> StorageResult<bool> {
        let reader = self.reader.lock().unwrap();
        let found: Option<i64> = reader
            .query_row("SELECT row_id FROM bookmarks WHERE row_id = ?1", [row_id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn bookmarked_row_ids(&self) -> StorageResult<Vec<i64>> {
        let reader = self.reader.lock().unwrap();
        let mut stmt = reader.prepare("SELECT row_id FROM bookmarks ORDER BY row_id")?;
        let ids = stmt.query_map([], |r| r.get(0))?.filter_map(|r| r.ok()).collect();
        Ok(ids)
    }

    pub fn set_bookmarks(&self, row_ids: &[i64]) -> StorageResult<()> {
        let writer = self.writer.lock().unwrap();
        let tx = writer.unchecked_transaction()?;
        for chunk in row_ids.chunks(5_000) {
            for id in chunk {
                tx.execute("INSERT OR IGNORE INTO bookmarks(row_id) VALUES (?1)", [id])?;
            }
        }
        tx.commit()?;
        drop(writer);
        self.invalidate_count_cache();
        Ok(())
    }

    // ---- tags --------------------------------------------------------

    pub fn add_tag(&self, row_id: i64, label: &str) -> StorageResult<()> {
        let writer = self.writer.lock().unwrap();
        writer.execute(
            "INSERT OR IGNORE INTO tags(row_id, label) VALUES (?1, ?2)",
            rusqlite::params![row_id, label],
        )?;
        drop(writer);
        self.invalidate_count_cache();
        Ok(())
    }

    pub fn remove_tag(&self, row_id: i64, label: &str) -> StorageResult<()> {
        let writer = self.writer.lock().unwrap();
        writer.execute(
            "DELETE FROM tags WHERE row_id = ?1 AND label = ?2",
            rusqlite::params![row_id, label],
        )?;
        drop(writer);
        self.invalidate_count_cache();
        Ok(())
    }

    pub fn tags_for_row(&self, row_id: i64) -> StorageResult<Vec<String>> {
        let reader = self.reader.lock().unwrap();
        let mut stmt = reader.prepare("SELECT label FROM tags WHERE row_id = ?1 ORDER BY label")?;
        let labels = stmt.query_map([row_id], |r| r.get(0))?.filter_map(|r| r.ok()).collect();
        Ok(labels)
    }

    pub fn distinct_tag_labels(&self) -> StorageResult<Vec<String>> {
        let reader = self.reader.lock().unwrap();
        let mut stmt = reader.prepare("SELECT DISTINCT label FROM tags ORDER BY label")?;
        let labels = stmt.query_map([], |r| r.get(0))?.filter_map(|r| r.ok()).collect();
        Ok(labels)
    }

    // ---- count cache ---------------------------------------------------

    /// Count cache (§4.1, §4.4): keyed by the compiled WHERE clause +
    /// parameter serialization. Any mutation invalidates it.
    pub fn cached_count(&self, signature: &str) -> Option<i64> {
        let cache = self.count_cache.lock().unwrap();
        match cache.as_ref() {
            Some((sig, count)) if sig == signature => Some(*count),
            _ => None,
        }
    }

    pub fn store_count(&self, signature: String, count: i64) {
        *self.count_cache.lock().unwrap() = Some((signature, count));
    }

    pub fn invalidate_count_cache(&self) {
        *self.count_cache.lock().unwrap() = None;
    }

    pub fn row_count(&self) -> StorageResult<i64> {
        let reader = self.reader.lock().unwrap();
        let count = reader.query_row("SELECT COUNT(*) FROM rows", [], |r| r.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::HeaderMap;

    fn make_store(cols: &[&str]) -> (HeaderMap, TabStore) {
        let headers = HeaderMap::new(cols.iter().map(|s| s.to_string()).collect());
        let store = TabStore::create(&headers).unwrap();
        (headers, store)
    }

    #[test]
    fn insert_and_count_roundtrip() {
        let (_headers, store) = make_store(&["timestamp", "computer", "event"]);
        let batch: RowBatch = vec![
            vec![Some("2024-01-01 00:00:01".into()), Some("HOST".into()), Some("4624".into())],
            vec![Some("2024-01-01 00:00:02".into()), Some("HOST".into()), Some("4625".into())],
        ];
        store.insert_batch(&batch).unwrap();
        assert_eq!(store.row_count().unwrap(), 2);
        store.close().unwrap();
    }

    #[test]
    fn bookmark_toggle_is_idempotent_set() {
        let (_headers, store) = make_store(&["a"]);
        store.insert_batch(&vec![vec![Some("x".into())]]).unwrap();
        assert!(store.toggle_bookmark(1).unwrap());
        assert!(store.is_bookmarked(1).unwrap());
        assert!(!store.toggle_bookmark(1).unwrap());
        assert!(!store.is_bookmarked(1).unwrap());
        store.close().unwrap();
    }

    #[test]
    fn tag_relation_is_a_set() {
        let (_headers, store) = make_store(&["a"]);
        store.insert_batch(&vec![vec![Some("x".into())]]).unwrap();
        store.add_tag(1, "suspicious").unwrap();
        store.add_tag(1, "suspicious").unwrap();
        assert_eq!(store.tags_for_row(1).unwrap(), vec!["suspicious".to_string()]);
        store.close().unwrap();
    }
}
