//! Application layer - use cases and orchestration.
//!
//! Paging, record extraction, export encoding and terminal formatting.

pub mod export;
pub mod extractor;
pub mod formatter;
pub mod pager;
pub mod parser;

pub use export::{write_table, write_workbook, ExportFormat, RecordTable};
pub use extractor::{find_user, load_contacts, load_groups, load_messages};
pub use formatter::{
    format_contacts, format_groups, format_messages, format_page, format_rows, format_stats,
    format_table_list, format_user,
};
pub use pager::{search_rows, Pager};
pub use parser::extract_active_uid;
