use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use super::{DocumentStore, PageEnumerator};
use crate::error::StoreResult;

/// Local corpus mirror: one row per page, plus a log of edit notes.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS pages (
                title      TEXT PRIMARY KEY,
                text       TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS edits (
                id       INTEGER PRIMARY KEY,
                title    TEXT NOT NULL,
                note     TEXT NOT NULL,
                saved_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_edits_title ON edits(title);
            ",
        )?;
        Ok(SqliteStore { conn })
    }

    /// Load every `*.wiki` file in `dir` as a page. Underscores in the file
    /// stem become spaces in the title.
    pub fn import_dir(&self, dir: &Path) -> StoreResult<usize> {
        let mut imported = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wiki") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let title = stem.replace('_', " ");
            let text = std::fs::read_to_string(&path)?;
            self.save(&title, &text, "Import from file")?;
            imported += 1;
        }
        info!("Imported {} pages from {}", imported, dir.display());
        Ok(imported)
    }

    #[cfg(test)]
    pub fn edit_count(&self, title: &str) -> StoreResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM edits WHERE title = ?1",
            [title],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}

impl DocumentStore for SqliteStore {
    fn fetch(&self, title: &str) -> StoreResult<String> {
        let text: Option<String> = self
            .conn
            .query_row("SELECT text FROM pages WHERE title = ?1", [title], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(text.unwrap_or_default())
    }

    fn save(&self, title: &str, text: &str, note: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO pages (title, text) VALUES (?1, ?2)
             ON CONFLICT(title) DO UPDATE SET text = excluded.text, updated_at = datetime('now')",
            rusqlite::params![title, text],
        )?;
        self.conn.execute(
            "INSERT INTO edits (title, note) VALUES (?1, ?2)",
            rusqlite::params![title, note],
        )?;
        Ok(())
    }
}

impl PageEnumerator for SqliteStore {
    fn list_from(&self, from: &str, limit: usize) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT title FROM pages WHERE title >= ?1 ORDER BY title LIMIT ?2")?;
        let titles = stmt
            .query_map(rusqlite::params![from, limit as i64], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(titles)
    }
}
