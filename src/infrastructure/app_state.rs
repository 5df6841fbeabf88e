//! Persisted app state.
//!
//! Plain key-value string entries (chosen file paths, the active uid) kept
//! in a small `SQLite` file so they survive across runs.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{AppError, Result};

/// Path of the last picked `database-config.json`.
pub const KEY_CONFIG_PATH: &str = "configPath";
/// Path of the last picked `Storage.db`.
pub const KEY_STORAGE_PATH: &str = "storagePath";
/// Active user identifier.
pub const KEY_UID: &str = "uid";

/// Key-value store backed by `SQLite`.
pub struct AppState {
    conn: Connection,
}

impl AppState {
    /// Opens or creates the state database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create state directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::query)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;

             CREATE TABLE IF NOT EXISTS app_state (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at TEXT NOT NULL DEFAULT (datetime('now'))
             );",
        )
        .map_err(AppError::query)?;

        Ok(Self { conn })
    }

    /// Reads one entry.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(AppError::query)
    }

    /// Inserts or replaces one entry.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO app_state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            ",
                params![key, value],
            )
            .map_err(AppError::query)?;

        tracing::debug!(key, "Saved app state entry");
        Ok(())
    }

    /// Deletes one entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM app_state WHERE key = ?1", [key])
            .map_err(AppError::query)?;
        Ok(n > 0)
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM app_state ORDER BY key")
            .map_err(AppError::query)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(AppError::query)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AppError::query)?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_schema() {
        let dir = tempdir().unwrap();
        let state = AppState::open(&dir.path().join("nested").join("state.db")).unwrap();

        let count: i64 = state
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='app_state'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    fn test_set_overwrites() {
        let dir = tempdir().unwrap();
        let state = AppState::open(&dir.path().join("state.db")).unwrap();

        assert_eq!(state.get(KEY_UID).unwrap(), None);
        state.set(KEY_UID, "123").unwrap();
        state.set(KEY_UID, "456").unwrap();
        assert_eq!(state.get(KEY_UID).unwrap().as_deref(), Some("456"));
        assert_eq!(state.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let state = AppState::open(&path).unwrap();
            state.set(KEY_STORAGE_PATH, "/sdcard/Storage.db").unwrap();
        }
        let state = AppState::open(&path).unwrap();
        assert_eq!(
            state.get(KEY_STORAGE_PATH).unwrap().as_deref(),
            Some("/sdcard/Storage.db")
        );
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let state = AppState::open(&dir.path().join("state.db")).unwrap();
        state.set(KEY_CONFIG_PATH, "a").unwrap();
        assert!(state.remove(KEY_CONFIG_PATH).unwrap());
        assert!(!state.remove(KEY_CONFIG_PATH).unwrap());
    }
}
