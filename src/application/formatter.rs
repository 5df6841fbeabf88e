//! Terminal output for browsed and extracted data.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::Value;

use crate::domain::{Contact, ExtractionStats, Group, Message, Page, RawRow, UserInfo};

/// Widest cell shown for free text.
const CELL_WIDTH: usize = 40;

/// Formats the table list of a database.
pub fn format_table_list(tables: &[String]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Table"]);

    for (i, name) in tables.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), name.clone()]);
    }

    table.to_string()
}

/// Formats raw rows under the given column headers.
pub fn format_rows(columns: &[String], rows: &[RawRow]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(columns.to_vec());

    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|col| truncate(&cell_text(row.get(col)), CELL_WIDTH))
                .collect::<Vec<_>>(),
        );
    }

    table.to_string()
}

/// Formats one page with a "page x / y" footer.
pub fn format_page(page: &Page) -> String {
    let (first, last) = if page.rows.is_empty() {
        (0, 0)
    } else {
        (page.offset() + 1, page.offset() + page.rows.len() as u64)
    };

    let mut out = format!(
        "{}\n{} {} / {}  (rows {}-{} of {})",
        format_rows(&page.columns, &page.rows),
        "Page".bold(),
        page.page_index + 1,
        page.page_count(),
        first,
        last,
        page.total_rows
    );

    if page.rows.is_empty() && page.total_rows > 0 {
        out.push_str(&format!("  {}", "past the last page".yellow()));
    }
    out
}

/// Formats a contact listing.
pub fn format_contacts(contacts: &[Contact]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Key", "Name", "Avatar"]);

    for c in contacts {
        let name = if c.name.is_empty() { "-" } else { c.name.as_str() };
        table.add_row(vec![
            c.key.clone(),
            truncate(name, 30),
            truncate(&c.avatar, CELL_WIDTH),
        ]);
    }

    table.to_string()
}

/// Formats a group listing.
pub fn format_groups(groups: &[Group]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Members"]);

    for g in groups {
        table.add_row(vec![
            g.id.clone(),
            truncate(&g.name, 30),
            g.member_count.to_string(),
        ]);
    }

    table.to_string()
}

/// Formats a message listing.
pub fn format_messages(messages: &[Message]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Time", "Sender", "Content"]);

    for m in messages {
        table.add_row(vec![
            m.id.to_string(),
            m.time.clone(),
            truncate(&m.sender, 20),
            truncate(&m.content, CELL_WIDTH),
        ]);
    }

    table.to_string()
}

/// Formats the account owner.
pub fn format_user(user: &UserInfo) -> String {
    let avatar = if user.avatar.is_empty() {
        "(no avatar)".dimmed().to_string()
    } else {
        user.avatar.clone()
    };

    format!(
        "{}\n  UID: {}\n  Name: {}\n  Avatar: {}",
        "👤 Account".bold(),
        user.uid.cyan(),
        user.name.green(),
        avatar
    )
}

/// Formats extraction statistics for display.
pub fn format_stats(stats: &ExtractionStats) -> String {
    format!(
        "{}\n  Contacts: {}\n  Groups: {}\n  Messages: {}",
        "📊 Statistics".bold(),
        stats.contacts.to_string().cyan(),
        stats.groups.to_string().green(),
        stats.messages.to_string().blue(),
    )
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Truncates to `max_len` characters (first line only) with an ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
