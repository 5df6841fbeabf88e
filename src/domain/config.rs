//! Application configuration.
//!
//! Loaded from `config.toml`; every field has a default so a partial file
//! (or none at all) is valid.

use std::path::PathBuf;

use serde::Deserialize;

use super::{AppError, Result};

/// Table browser settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowseConfig {
    /// Rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

const fn default_page_size() -> u64 {
    200
}

/// Where and how records are extracted.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Key/value table holding contact and group JSON.
    #[serde(default = "default_info_table")]
    pub info_table: String,

    /// Typed messages table.
    #[serde(default = "default_messages_table")]
    pub messages_table: String,

    /// `zType` value that marks a group entry.
    #[serde(default = "default_group_type")]
    pub group_type: String,

    /// Rows of the info table scanned for groups (0 = all).
    #[serde(default = "default_group_scan_limit")]
    pub group_scan_limit: u64,

    /// Messages loaded per run (0 = all).
    #[serde(default = "default_message_limit")]
    pub message_limit: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            info_table: default_info_table(),
            messages_table: default_messages_table(),
            group_type: default_group_type(),
            group_scan_limit: default_group_scan_limit(),
            message_limit: default_message_limit(),
        }
    }
}

fn default_info_table() -> String {
    "info-cache".to_string()
}

fn default_messages_table() -> String {
    "messages".to_string()
}

fn default_group_type() -> String {
    "group".to_string()
}

const fn default_group_scan_limit() -> u64 {
    500
}

const fn default_message_limit() -> u64 {
    200
}

/// Handling of the picked database file.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Copy the file (and its WAL/SHM siblings) into the work directory
    /// before opening it.
    #[serde(default = "default_copy_before_open")]
    pub copy_before_open: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            copy_before_open: default_copy_before_open(),
        }
    }
}

const fn default_copy_before_open() -> bool {
    true
}

/// Path configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub browse: BrowseConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".zalo-data-extractor")
    }

    /// Persisted app state (chosen paths, active uid).
    #[must_use]
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir().join("state.db")
    }

    /// Directory holding working copies of opened databases.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.data_dir().join("work")
    }

    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir().join("exports")
    }

    /// Default parent of acquisition workspaces.
    #[must_use]
    pub fn acquisitions_dir(&self) -> PathBuf {
        self.data_dir().join("acquisitions")
    }

    /// Rejects values no command can work with.
    ///
    /// # Errors
    /// Returns `Config` for a zero page size or an empty table name.
    pub fn validate(&self) -> Result<()> {
        if self.browse.page_size == 0 {
            return Err(AppError::Config {
                message: "browse.page_size must be greater than 0".into(),
            });
        }

        for (field, value) in [
            ("extract.info_table", &self.extract.info_table),
            ("extract.messages_table", &self.extract.messages_table),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config {
                    message: format!("{field} must not be empty"),
                });
            }
        }

        Ok(())
    }
}

/// Turns a `0 = unlimited` setting into an optional row limit.
#[must_use]
pub const fn row_limit(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.browse.page_size, 200);
        assert_eq!(config.extract.info_table, "info-cache");
        assert_eq!(config.extract.group_scan_limit, 500);
        assert!(config.storage.copy_before_open);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = AppConfig::default();
        config.browse.page_size = 0;
        assert!(matches!(config.validate(), Err(AppError::Config { .. })));
    }

    #[test]
    fn test_empty_table_name_rejected() {
        let mut config = AppConfig::default();
        config.extract.messages_table = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_paths() {
        let config = AppConfig {
            paths: PathConfig {
                data_dir: Some(PathBuf::from("/tmp/zl")),
            },
            ..Default::default()
        };
        assert_eq!(config.state_db_path(), PathBuf::from("/tmp/zl/state.db"));
        assert_eq!(config.work_dir(), PathBuf::from("/tmp/zl/work"));
        assert_eq!(
            config.acquisitions_dir(),
            PathBuf::from("/tmp/zl/acquisitions")
        );
    }

    #[test]
    fn test_row_limit() {
        assert_eq!(row_limit(0), None);
        assert_eq!(row_limit(500), Some(500));
    }
}
