//! `SQLite` session over a picked database file.
//!
//! A [`Session`] owns the read-only connection, the working copy it was
//! opened from, and the single-flight guard every query goes through.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::{Number, Value};
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::config::StorageConfig;
use crate::domain::{AppError, RawRow, Result};

use super::db_files::{copy_to_work_dir, sha256_file, WorkingCopy};

/// Raw key-value pair from an `info-cache` style table.
#[derive(Debug, Clone)]
pub struct KvRow {
    pub key: String,
    pub val: String,
}

/// Raw row from a typed `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender: String,
    pub content: String,
    /// Epoch seconds.
    pub time: i64,
}

/// An open database and the files behind it.
pub struct Session {
    conn: Mutex<Connection>,
    source: PathBuf,
    fingerprint: String,
    // Declared after `conn` so the connection is closed before the copy is removed.
    working_copy: Option<WorkingCopy>,
}

impl Session {
    /// Opens a database file in read-only mode.
    ///
    /// With `copy_before_open` the file and its `-wal`/`-shm` siblings are
    /// copied into `work_dir` first and the copy is opened. The copy is
    /// deleted when the session is dropped.
    ///
    /// # Errors
    /// Returns error if the file is missing, cannot be copied or opened.
    pub fn open(path: &Path, storage: &StorageConfig, work_dir: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::DatabaseNotFound {
                path: path.to_path_buf(),
            });
        }

        let fingerprint = sha256_file(path)?;
        tracing::info!(path = %path.display(), sha256 = %fingerprint, "Opening database");

        let working_copy = if storage.copy_before_open {
            Some(copy_to_work_dir(path, work_dir)?)
        } else {
            None
        };
        let opened = working_copy.as_ref().map_or(path, WorkingCopy::path);
        let conn = open_read_only(opened)?;

        Ok(Self {
            conn: Mutex::new(conn),
            source: path.to_path_buf(),
            fingerprint,
            working_copy,
        })
    }

    /// Path the user picked.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path the connection actually reads (the working copy, or the source).
    #[must_use]
    pub fn opened_path(&self) -> &Path {
        self.working_copy
            .as_ref()
            .map_or(self.source.as_path(), WorkingCopy::path)
    }

    /// SHA-256 of the source file at open time, lowercase hex.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Takes the connection for one operation.
    ///
    /// Overlapping requests are rejected rather than queued.
    ///
    /// # Errors
    /// Returns `Busy` while another operation holds the connection.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.try_lock().map_err(|_| AppError::Busy)
    }

    /// Lists user tables of the open database.
    ///
    /// # Errors
    /// Returns error if the session is busy or the query fails.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.acquire()?;
        list_tables(&conn)
    }
}

fn open_read_only(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn = Connection::open_with_flags(path, flags).map_err(AppError::query)?;

    conn.execute_batch(
        "PRAGMA query_only = ON;
         PRAGMA temp_store = MEMORY;",
    )
    .map_err(AppError::query)?;

    // Fails early on files that are not SQLite databases.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(AppError::query)?;

    Ok(conn)
}

/// Quotes a name for use as an SQL identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Lists user tables, sorted by name.
///
/// # Errors
/// Returns error if query fails.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(AppError::query)?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(AppError::query)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(AppError::query)?;

    Ok(names)
}

/// Checks that `table` names an existing table and returns it quoted.
///
/// # Errors
/// Returns `Query` if no such table exists.
pub fn checked_table(conn: &Connection, table: &str) -> Result<String> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()
        .map_err(AppError::query)?
        .is_some();

    if !exists {
        return Err(AppError::Query {
            message: format!("no such table: {table}"),
            source: None,
        });
    }

    Ok(quote_identifier(table))
}

/// Counts rows of a table.
///
/// # Errors
/// Returns error if the table does not exist or the query fails.
pub fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    let quoted = checked_table(conn, table)?;
    let count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {quoted}"), [], |row| {
            row.get(0)
        })
        .map_err(AppError::query)?;

    Ok(u64::try_from(count).unwrap_or(0))
}

/// Fetches `limit` rows starting at `offset`, with their column names.
///
/// # Errors
/// Returns error if the table does not exist or the query fails.
pub fn fetch_range(
    conn: &Connection,
    table: &str,
    limit: u64,
    offset: u64,
) -> Result<(Vec<String>, Vec<RawRow>)> {
    let quoted = checked_table(conn, table)?;
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {quoted} LIMIT ?1 OFFSET ?2"))
        .map_err(AppError::query)?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let rows = stmt
        .query_map([to_sql_int(limit), to_sql_int(offset)], |row| {
            let mut raw = RawRow::new();
            for (i, name) in columns.iter().enumerate() {
                raw.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            Ok(raw)
        })
        .map_err(AppError::query)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(AppError::query)?;

    tracing::debug!("Fetched {} rows from '{}' at offset {}", rows.len(), table, offset);

    Ok((columns, rows))
}

/// Fetches `key, val` rows of a key-value table.
///
/// # Errors
/// Returns error if the table does not exist or the query fails.
pub fn fetch_kv(conn: &Connection, table: &str, limit: Option<u64>) -> Result<Vec<KvRow>> {
    let quoted = checked_table(conn, table)?;
    let mut stmt = conn
        .prepare(&format!("SELECT key, val FROM {quoted} LIMIT ?1"))
        .map_err(AppError::query)?;

    let rows = stmt
        .query_map([limit.map_or(-1, to_sql_int)], kv_from_row)
        .map_err(AppError::query)?;

    let mut entries = Vec::new();
    for row in rows {
        match row {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to read row: {}", e);
            }
        }
    }

    tracing::debug!("Fetched {} key-value rows from '{}'", entries.len(), table);

    Ok(entries)
}

/// Fetches the rows of a key-value table whose key equals `key`.
///
/// # Errors
/// Returns error if the table does not exist or the query fails.
pub fn fetch_kv_by_key(conn: &Connection, table: &str, key: &str) -> Result<Vec<KvRow>> {
    let quoted = checked_table(conn, table)?;
    let mut stmt = conn
        .prepare(&format!("SELECT key, val FROM {quoted} WHERE key = ?1 LIMIT 1"))
        .map_err(AppError::query)?;

    let rows = stmt
        .query_map([key], kv_from_row)
        .map_err(AppError::query)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(AppError::query)?;

    Ok(rows)
}

/// Fetches `id, sender, content, time` rows of a messages table.
///
/// # Errors
/// Returns error if the table or one of the columns does not exist.
pub fn fetch_messages(
    conn: &Connection,
    table: &str,
    limit: Option<u64>,
) -> Result<Vec<MessageRow>> {
    let quoted = checked_table(conn, table)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, sender, content, time FROM {quoted} LIMIT ?1"
        ))
        .map_err(AppError::query)?;

    let rows = stmt
        .query_map([limit.map_or(-1, to_sql_int)], |row| {
            Ok(MessageRow {
                id: to_i64(row.get_ref(0)?),
                sender: to_text(row.get_ref(1)?),
                content: to_text(row.get_ref(2)?),
                time: to_i64(row.get_ref(3)?),
            })
        })
        .map_err(AppError::query)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(AppError::query)?;

    Ok(rows)
}

fn kv_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KvRow> {
    Ok(KvRow {
        key: to_text(row.get_ref(0)?),
        val: to_text(row.get_ref(1)?),
    })
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Converts a cell to a JSON primitive.
fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(blob_to_string(b)),
    }
}

/// Renders a cell as text; NULL becomes an empty string.
fn to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => blob_to_string(b),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_i64(value: ValueRef<'_>) -> i64 {
    match value {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
        ValueRef::Null | ValueRef::Blob(_) => 0,
    }
}

/// Valid UTF-8 blobs are kept as text, anything else as lowercase hex.
fn blob_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// Builds a database with an `info-cache` table and a `messages` table.
    pub(crate) fn fixture_db(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("Storage.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE "info-cache" (key TEXT PRIMARY KEY, val TEXT);
            INSERT INTO "info-cache" VALUES
                ('u1', '{"zName":"Alice","avatar":"http://x/a.png"}'),
                ('u2', 'not json'),
                ('g1', '{"zType":"group","zName":"Family","memberCount":5}'),
                ('g2', '{"zType":"group"}'),
                ('u3', '{"zType":"user","zName":"Bob"}');
            CREATE TABLE messages (id INTEGER PRIMARY KEY, sender TEXT, content TEXT, time INTEGER);
            INSERT INTO messages VALUES
                (1, 'Alice', 'hi "there"', 1700000000),
                (2, NULL, 'second', 1700000060);
            "#,
        )
        .unwrap();
        path
    }

    pub(crate) fn open_fixture(dir: &TempDir) -> Session {
        let path = fixture_db(dir);
        Session::open(&path, &StorageConfig::default(), &dir.path().join("work")).unwrap()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("info-cache"), "\"info-cache\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let result = Session::open(
            &dir.path().join("missing.db"),
            &StorageConfig::default(),
            dir.path(),
        );
        assert!(matches!(result, Err(AppError::DatabaseNotFound { .. })));
    }

    #[test]
    fn test_open_uses_working_copy() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);

        assert_ne!(session.opened_path(), session.source());
        assert!(session.opened_path().starts_with(dir.path().join("work")));
        assert_eq!(session.fingerprint().len(), 64);
    }

    #[test]
    fn test_dropped_sessions_leave_no_copies() {
        let dir = tempdir().unwrap();
        let path = fixture_db(&dir);
        let work = dir.path().join("work");

        for _ in 0..3 {
            let session = Session::open(&path, &StorageConfig::default(), &work).unwrap();
            assert!(session.opened_path().exists());
        }

        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_open_in_place() {
        let dir = tempdir().unwrap();
        let path = fixture_db(&dir);
        let storage = StorageConfig {
            copy_before_open: false,
        };
        let session = Session::open(&path, &storage, &dir.path().join("work")).unwrap();
        assert_eq!(session.opened_path(), path.as_path());
    }

    #[test]
    fn test_open_rejects_non_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.db");
        std::fs::write(&path, "definitely not sqlite ".repeat(100)).unwrap();
        let storage = StorageConfig {
            copy_before_open: false,
        };
        let result = Session::open(&path, &storage, dir.path());
        assert!(matches!(result, Err(AppError::Query { .. })));
    }

    #[tokio::test]
    async fn test_list_tables() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let tables = session.list_tables().await.unwrap();
        assert_eq!(tables, vec!["info-cache".to_string(), "messages".to_string()]);
    }

    #[test]
    fn test_checked_table_rejects_unknown_and_injection() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let conn = session.acquire().unwrap();

        assert!(checked_table(&conn, "nope").is_err());
        assert!(checked_table(&conn, "messages; DROP TABLE messages").is_err());
        assert_eq!(checked_table(&conn, "info-cache").unwrap(), "\"info-cache\"");
    }

    #[test]
    fn test_acquire_is_single_flight() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);

        let held = session.acquire().unwrap();
        assert!(matches!(session.acquire(), Err(AppError::Busy)));
        drop(held);
        assert!(session.acquire().is_ok());
    }

    #[test]
    fn test_fetch_messages_handles_null_sender() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let conn = session.acquire().unwrap();

        let rows = fetch_messages(&conn, "messages", None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].sender, "");
        assert_eq!(rows[0].time, 1_700_000_000);
    }

    #[test]
    fn test_fetch_kv_limit() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let conn = session.acquire().unwrap();

        assert_eq!(fetch_kv(&conn, "info-cache", None).unwrap().len(), 5);
        assert_eq!(fetch_kv(&conn, "info-cache", Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_blob_to_string() {
        assert_eq!(blob_to_string(b"abc"), "abc");
        assert_eq!(blob_to_string(&[0xff, 0x00]), "ff00");
    }
}
