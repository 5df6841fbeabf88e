//! Paginated table browsing.

use serde_json::Value;

use crate::domain::{AppError, Page, RawRow, Result};
use crate::infrastructure::sqlite_reader::{count_rows, fetch_range};
use crate::infrastructure::Session;

/// Loads fixed-size pages of a table.
#[derive(Debug, Clone, Copy)]
pub struct Pager {
    page_size: u64,
}

impl Pager {
    /// Create a pager with the given page size.
    ///
    /// # Errors
    /// Returns `Config` if `page_size` is 0.
    pub fn new(page_size: u64) -> Result<Self> {
        if page_size == 0 {
            return Err(AppError::Config {
                message: "page size must be greater than 0".into(),
            });
        }
        Ok(Self { page_size })
    }

    /// Loads page `page_index` of `table`.
    ///
    /// The row count and the range are read under one acquisition of the
    /// session, so `total_rows` always matches `rows`. A page past the end is
    /// returned empty.
    ///
    /// # Errors
    /// Returns `Busy` if another query is running, `Query` if the table does
    /// not exist or the engine rejects the statement.
    pub async fn load_page(&self, session: &Session, table: &str, page_index: u64) -> Result<Page> {
        let conn = session.acquire()?;

        let total_rows = count_rows(&conn, table)?;
        let offset = page_index.saturating_mul(self.page_size);

        let (columns, rows) = fetch_range(&conn, table, self.page_size, offset)?;

        tracing::debug!(
            table,
            page_index,
            total_rows,
            rows = rows.len(),
            "Loaded page"
        );

        Ok(Page {
            table: table.to_string(),
            columns,
            rows,
            page_index,
            page_size: self.page_size,
            total_rows,
        })
    }

    /// Loads the page after `current`, or `None` at the last page.
    ///
    /// # Errors
    /// Same as [`Pager::load_page`].
    pub async fn next(&self, session: &Session, current: &Page) -> Result<Option<Page>> {
        if !current.has_next() {
            return Ok(None);
        }
        self.load_page(session, &current.table, current.page_index + 1)
            .await
            .map(Some)
    }

    /// Loads the page before `current`, or `None` at page 0.
    ///
    /// # Errors
    /// Same as [`Pager::load_page`].
    pub async fn prev(&self, session: &Session, current: &Page) -> Result<Option<Page>> {
        if !current.has_prev() {
            return Ok(None);
        }
        self.load_page(session, &current.table, current.page_index - 1)
            .await
            .map(Some)
    }
}

/// Rows of `page` with a cell containing `query`, ignoring case.
///
/// An empty query matches every row. NULL cells never match.
#[must_use]
pub fn search_rows(page: &Page, query: &str) -> Vec<RawRow> {
    let needle = query.to_lowercase();
    page.rows
        .iter()
        .filter(|row| needle.is_empty() || row.values().any(|cell| cell_contains(cell, &needle)))
        .cloned()
        .collect()
}

fn cell_contains(cell: &Value, needle: &str) -> bool {
    match cell {
        Value::Null => false,
        Value::String(s) => s.to_lowercase().contains(needle),
        other => other.to_string().to_lowercase().contains(needle),
    }
}
