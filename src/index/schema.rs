//! SQLite schema for the source index.

use rusqlite::Connection;
use std::path::Path;

use crate::error::{SpliceError, SpliceResult};

pub const SCHEMA_VERSION: i64 = 1;

pub fn open_or_create(path: &Path) -> SpliceResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> SpliceResult<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> SpliceResult<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            last_modified REAL NOT NULL DEFAULT 0,
            hash TEXT NOT NULL,
            docstring TEXT NOT NULL DEFAULT '',
            content_preview TEXT NOT NULL DEFAULT '',
            lines_count INTEGER NOT NULL DEFAULT 0,
            is_generated INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS symbols (
            id INTEGER PRIMARY KEY,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            line_start INTEGER NOT NULL,
            line_end INTEGER NOT NULL,
            docstring TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS imports (
            id INTEGER PRIMARY KEY,
            source_file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            module_name TEXT NOT NULL,
            alias TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
        CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
        CREATE INDEX IF NOT EXISTS idx_imports_module ON imports(module_name);
        CREATE INDEX IF NOT EXISTS idx_imports_file ON imports(source_file_id);
        ",
    )?;

    let current: Option<i64> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)).ok();
    match current {
        None => {
            conn.execute("INSERT INTO schema_version(version) VALUES(?1)", [SCHEMA_VERSION])?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(SpliceError::GraphBuild(format!(
                "unsupported source index schema version {version}; expected {SCHEMA_VERSION}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_or_create_inserts_schema_version() {
        let tmp = TempDir::new().expect("temp dir");
        let db = tmp.path().join("nested").join("index.db");
        let conn = open_or_create(&db).expect("open db");
        let version: i64 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .expect("query version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn open_or_create_rejects_mismatched_schema_version() {
        let tmp = TempDir::new().expect("temp dir");
        let db = tmp.path().join("index.db");
        let conn = Connection::open(&db).expect("open db");
        conn.execute_batch(
            "CREATE TABLE schema_version(version INTEGER NOT NULL);\
             INSERT INTO schema_version(version) VALUES(999);",
        )
        .expect("seed schema version");

        let err = open_or_create(&db).expect_err("must fail on mismatched schema version");
        assert!(err.to_string().contains("unsupported source index schema version"));
    }
}
