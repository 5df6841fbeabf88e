//! Domain layer - core types.
//!
//! Pure models, configuration and error types without any IO.

pub mod config;
pub mod error;
pub mod models;

pub use config::{row_limit, AppConfig};
pub use error::{AppError, Result};
pub use models::{Contact, ExtractionStats, Group, Message, Page, RawRow, Record, UserInfo};
