//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod acquisition;
pub mod app_state;
pub mod config;
pub mod db_files;
pub mod sqlite_reader;

pub use acquisition::{acquire, Custody};
pub use app_state::AppState;
pub use config::{ensure_config_exists, load_config};
pub use db_files::find_sqlite_files;
pub use sqlite_reader::Session;
