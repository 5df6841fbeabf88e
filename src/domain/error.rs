//! Domain-level error types for zalo-data-extractor.
//!
//! All errors are typed with `thiserror`. Every variant ends the current
//! command and is reported to the user; none of them is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database file not found at the given location.
    #[error("Database not found at: {path}")]
    DatabaseNotFound { path: PathBuf },

    /// The engine rejected a statement or the table does not exist.
    #[error("Query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A row addressed by key exists but its payload cannot be decoded.
    #[error("Malformed record '{key}': {message}")]
    MalformedRecord { key: String, message: String },

    /// An expected row, field or file is absent.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Another query is still running on the same session.
    #[error("A query is already in flight on this database")]
    Busy,

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Encoding or writing an export file failed.
    #[error("Export error: {message}")]
    Export {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AppError {
    /// Create a query error from rusqlite error.
    pub fn query(err: rusqlite::Error) -> Self {
        Self::Query {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an export error with context.
    pub fn export<E>(message: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Export {
            message: format!("{}: {err}", message.into()),
            source: Some(Box::new(err)),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
