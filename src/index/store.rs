//! Read and write access to the source index.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::domain::{ImportRecord, SourceFile, Symbol, SymbolKind};
use crate::error::SpliceResult;
use crate::index::schema;

/// Everything the scanner learned about one file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub file: SourceFile,
    pub file_type: String,
    pub last_modified: f64,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportRecord>,
}

/// A symbol together with the file that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolLocation {
    pub path: String,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCounts {
    pub files: usize,
    pub symbols: usize,
    pub imports: usize,
}

pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    pub fn open(path: &Path) -> SpliceResult<Self> {
        Ok(Self { conn: schema::open_or_create(path)? })
    }

    pub fn open_in_memory() -> SpliceResult<Self> {
        Ok(Self { conn: schema::open_in_memory()? })
    }

    /// Path → content hash for every indexed file.
    pub fn known_hashes(&self) -> SpliceResult<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT path, hash FROM files")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn file_hash(&self, path: &str) -> SpliceResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT hash FROM files WHERE path = ?1", [path], |row| row.get(0))
            .optional()?)
    }

    /// Insert or refresh a file, replacing its symbols and imports wholesale.
    pub fn record_file(&mut self, record: &FileRecord) -> SpliceResult<()> {
        let tx = self.conn.transaction()?;
        let file = &record.file;
        tx.execute(
            "INSERT INTO files(path, type, size_bytes, last_modified, hash, docstring, content_preview, lines_count, is_generated)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(path) DO UPDATE SET
                type = excluded.type,
                size_bytes = excluded.size_bytes,
                last_modified = excluded.last_modified,
                hash = excluded.hash,
                docstring = excluded.docstring,
                content_preview = excluded.content_preview,
                lines_count = excluded.lines_count,
                is_generated = excluded.is_generated",
            params![
                file.path,
                record.file_type,
                file.size_bytes as i64,
                record.last_modified,
                file.hash,
                file.docstring,
                file.preview,
                file.line_count as i64,
                file.is_generated,
            ],
        )?;
        let file_id: i64 =
            tx.query_row("SELECT id FROM files WHERE path = ?1", [&file.path], |row| row.get(0))?;

        tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM imports WHERE source_file_id = ?1", [file_id])?;

        for symbol in &record.symbols {
            tx.execute(
                "INSERT INTO symbols(file_id, name, kind, line_start, line_end, docstring)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    file_id,
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.line_start as i64,
                    symbol.line_end as i64,
                    symbol.doc,
                ],
            )?;
        }
        for import in &record.imports {
            tx.execute(
                "INSERT INTO imports(source_file_id, module_name, alias) VALUES(?1, ?2, ?3)",
                params![file_id, import.module, import.alias],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop every file not in `present`; owned rows go with them.
    pub fn remove_missing(&mut self, present: &HashSet<String>) -> SpliceResult<usize> {
        let stale: Vec<String> =
            self.known_hashes()?.into_keys().filter(|p| !present.contains(p)).collect();
        let tx = self.conn.transaction()?;
        for path in &stale {
            tx.execute("DELETE FROM files WHERE path = ?1", [path])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    pub fn file_paths(&self) -> SpliceResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM files ORDER BY path")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn files(&self) -> SpliceResult<Vec<SourceFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, hash, size_bytes, lines_count, content_preview, docstring, is_generated
             FROM files ORDER BY path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SourceFile {
                path: row.get(0)?,
                hash: row.get(1)?,
                size_bytes: row.get::<_, i64>(2)? as u64,
                line_count: row.get::<_, i64>(3)? as usize,
                preview: row.get(4)?,
                docstring: row.get(5)?,
                is_generated: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn symbols_for(&self, path: &str) -> SpliceResult<Vec<Symbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name, s.kind, s.line_start, s.line_end, s.docstring
             FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE f.path = ?1 ORDER BY s.line_start, s.name",
        )?;
        let rows = stmt.query_map([path], row_to_symbol)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?.into_iter().flatten().collect())
    }

    /// Where a symbol with this exact name is defined.
    pub fn find_symbol(&self, name: &str) -> SpliceResult<Vec<SymbolLocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name, s.kind, s.line_start, s.line_end, s.docstring, f.path
             FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE s.name = ?1 ORDER BY f.path, s.line_start",
        )?;
        let rows = stmt.query_map([name], |row| {
            let path: String = row.get(5)?;
            Ok(row_to_symbol(row)?.map(|symbol| SymbolLocation { path, symbol }))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?.into_iter().flatten().collect())
    }

    /// Every (importer path, import record) pair, importer-ordered.
    pub fn imports(&self) -> SpliceResult<Vec<(String, ImportRecord)>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.path, i.module_name, i.alias
             FROM imports i JOIN files f ON f.id = i.source_file_id
             ORDER BY f.path, i.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, ImportRecord { module: row.get(1)?, alias: row.get(2)? }))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Files whose imports name `module` or anything below it.
    pub fn dependents_of(&self, module: &str) -> SpliceResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT f.path
             FROM imports i JOIN files f ON f.id = i.source_file_id
             WHERE i.module_name = ?1 OR i.module_name LIKE ?2 ESCAPE '\\'
             ORDER BY f.path",
        )?;
        let pattern = format!("{}.%", escape_like(module));
        let rows = stmt.query_map(params![module, pattern], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn counts(&self) -> SpliceResult<IndexCounts> {
        let count = |table: &str| -> SpliceResult<usize> {
            let n: i64 =
                self.conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(IndexCounts { files: count("files")?, symbols: count("symbols")?, imports: count("imports")? })
    }
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Symbol>> {
    let kind: String = row.get(1)?;
    let Some(kind) = SymbolKind::parse(&kind) else {
        return Ok(None);
    };
    Ok(Some(Symbol {
        name: row.get(0)?,
        kind,
        line_start: row.get::<_, i64>(2)? as usize,
        line_end: row.get::<_, i64>(3)? as usize,
        doc: row.get(4)?,
    }))
}

fn escape_like(value: &str) -> String {
    value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
