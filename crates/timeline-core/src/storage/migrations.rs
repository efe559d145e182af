//! Schema and pragma management for a single tab's scratch store.
//!
//! Unlike a long-lived application database, a tab store is created fresh
//! on import start and discarded on tab close (§3 Tab lifetime), so there
//! is no multi-version migration chain to replay — just one schema applied
//! once, plus two pragma profiles the store switches between: bulk-insert
//! mode while streaming rows in, and query mode once import finishes.

use rusqlite::Connection;

/// PRAGMAs favoring raw insert throughput: no journaling, synchronous off,
/// a large write cache, single-user (exclusive) locking. Applied when a
/// tab is created, before the first batch insert.
pub const BULK_INSERT_PRAGMAS: &str = "
    PRAGMA journal_mode = OFF;
    PRAGMA synchronous = OFF;
    PRAGMA cache_size = -131072;
    PRAGMA temp_store = MEMORY;
    PRAGMA locking_mode = EXCLUSIVE;
    PRAGMA page_size = 8192;
";

/// PRAGMAs favoring concurrent interactive queries: WAL so reads don't
/// block on the occasional mutation, a moderate cache, and a read-side
/// memory map. Applied once at finalize and again after the last sort
/// index is built.
pub const QUERY_MODE_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA cache_size = -32000;
    PRAGMA temp_store = MEMORY;
    PRAGMA locking_mode = NORMAL;
    PRAGMA mmap_size = 268435456;
";

pub fn apply_bulk_insert_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(BULK_INSERT_PRAGMAS)
}

pub fn apply_query_mode_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(QUERY_MODE_PRAGMAS)
}

/// Creates the `rows`, `bookmarks`, `tags`, and `color_rules` tables for a
/// freshly allocated tab. `safe_columns` are the opaque `c0`, `c1`, …
/// identifiers assigned by [`crate::tab::sanitize_headers`]; row identity is
/// the table's own `rowid`/`id`, never reused within the tab's lifetime.
pub fn create_tab_schema(conn: &Connection, safe_columns: &[String]) -> rusqlite::Result<()> {
    let column_defs: String = safe_columns
        .iter()
        .map(|c| format!("{c} TEXT"))
        .collect::<Vec<_>>()
        .join(", ");

    let rows_sql = if column_defs.is_empty() {
        "CREATE TABLE rows (id INTEGER PRIMARY KEY AUTOINCREMENT)".to_string()
    } else {
        format!("CREATE TABLE rows (id INTEGER PRIMARY KEY AUTOINCREMENT, {column_defs})")
    };
    conn.execute(&rows_sql, [])?;

    conn.execute_batch(
        "
        CREATE TABLE bookmarks (
            row_id INTEGER NOT NULL UNIQUE
        );
        CREATE TABLE tags (
            row_id INTEGER NOT NULL,
            label TEXT NOT NULL,
            UNIQUE(row_id, label)
        );
        CREATE TABLE color_rules (
            ord INTEGER PRIMARY KEY,
            column TEXT NOT NULL,
            condition TEXT NOT NULL,
            value TEXT,
            background_color TEXT,
            foreground_color TEXT
        );
        ",
    )?;

    Ok(())
}

/// Builds a `CREATE INDEX` statement for one column on the `rows` table.
pub fn create_column_index_sql(safe_column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS idx_rows_{safe_column} ON rows({safe_column})",
    )
}

/// Builds the FTS5 virtual table spanning every original column, content-
/// linked to `rows` so the index stores no duplicate text.
pub fn create_fts_table_sql(safe_columns: &[String]) -> String {
    let cols = safe_columns.join(", ");
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS rows_fts USING fts5({cols}, content='rows', content_rowid='id')",
    )
}
