//! Configuration file management.
//!
//! Loads the TOML configuration and writes the default file on request.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Zalo Data Extractor Configuration
# Auto-generated - edit as needed

[browse]
# Rows shown per page in the table browser
page_size = 200

[extract]
# Key/value table holding contact and group JSON
info_table = "info-cache"

# Typed messages table (id, sender, content, time)
messages_table = "messages"

# zType value that marks a group
group_type = "group"

# Rows scanned for groups and messages loaded (0 = all)
group_scan_limit = 500
message_limit = 200

[storage]
# Work on a copy of the picked database instead of the original
copy_before_open = true

[paths]
# Custom data directory (optional, defaults to ~/.zalo-data-extractor)
# data_dir = "/custom/path"
"#;

/// Load configuration from `explicit`, else the default location, else
/// built-in defaults. The result is validated.
///
/// # Errors
/// Returns error if a file exists but cannot be read, parsed or validated.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => load_config_from_file(path)?,
        None => {
            let config_path = config_file_path();
            if config_path.exists() {
                load_config_from_file(&config_path)?
            } else {
                AppConfig::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create default configuration file if it doesn't exist.
///
/// Returns the path of the configuration file.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<PathBuf> {
    let config_path = config_file_path();

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(config_path)
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}
