//! Domain models for Zalo data.
//!
//! These models represent the records extracted from the app's `SQLite` files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row as returned by the query layer: column name to primitive value,
/// in column order.
pub type RawRow = Map<String, Value>;

/// A contact entry from the `info-cache` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Row key (the user id).
    pub key: String,
    /// Display name (`zName`).
    pub name: String,
    /// Avatar URI, possibly empty.
    pub avatar: String,
    /// Original JSON payload, empty when it could not be parsed.
    pub raw: String,
}

/// A message from the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub content: String,
    /// Send time rendered in the local time zone.
    pub time: String,
}

/// A group entry from the `info-cache` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(rename = "memberCount")]
    pub member_count: u64,
}

/// The account owner, looked up by the uid from `database-config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: String,
    pub name: String,
    pub avatar: String,
}

/// Record types the extractor produces: contacts, messages and groups.
/// Exporters take one homogeneous slice of a single kind per call.
pub trait Record: Serialize {
    /// Sheet / section name used by exporters.
    const KIND: &'static str;
    /// Serialized field names in declaration order.
    const COLUMNS: &'static [&'static str];
}

impl Record for Contact {
    const KIND: &'static str = "Contacts";
    const COLUMNS: &'static [&'static str] = &["key", "name", "avatar", "raw"];
}

impl Record for Message {
    const KIND: &'static str = "Messages";
    const COLUMNS: &'static [&'static str] = &["id", "sender", "content", "time"];
}

impl Record for Group {
    const KIND: &'static str = "Groups";
    const COLUMNS: &'static [&'static str] = &["id", "name", "memberCount"];
}

/// One offset-addressed slice of a table.
#[derive(Debug, Clone)]
pub struct Page {
    /// Table the rows came from.
    pub table: String,
    /// Column names in result order.
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Zero-based page number.
    pub page_index: u64,
    pub page_size: u64,
    pub total_rows: u64,
}

impl Page {
    /// Row offset of the first row on this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.page_index.saturating_mul(self.page_size)
    }

    /// Whether a following page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        (self.page_index + 1).saturating_mul(self.page_size) < self.total_rows
    }

    /// Whether a preceding page exists.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page_index > 0
    }

    /// Number of pages, at least 1 so an empty table shows "1 / 1".
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        if self.total_rows == 0 || self.page_size == 0 {
            1
        } else {
            self.total_rows.div_ceil(self.page_size)
        }
    }
}

/// Summary counts for an extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    pub contacts: usize,
    pub groups: usize,
    pub messages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_index: u64, total_rows: u64) -> Page {
        Page {
            table: "t".into(),
            columns: Vec::new(),
            rows: Vec::new(),
            page_index,
            page_size: 200,
            total_rows,
        }
    }

    #[test]
    fn test_page_boundaries() {
        assert!(!page(0, 450).has_prev());
        assert!(page(0, 450).has_next());
        assert!(page(1, 450).has_next());
        assert!(!page(2, 450).has_next());
        assert!(page(2, 450).has_prev());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page(0, 0).page_count(), 1);
        assert_eq!(page(0, 200).page_count(), 1);
        assert_eq!(page(0, 450).page_count(), 3);
    }

    #[test]
    fn test_empty_table_disables_navigation() {
        let empty = page(0, 0);
        assert!(!empty.has_next());
        assert!(!empty.has_prev());
    }

    fn serialized_keys<T: Record>(record: &T) -> Vec<String> {
        serde_json::to_value(record)
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn test_columns_match_serialized_fields() {
        let contact = Contact {
            key: "u1".into(),
            name: String::new(),
            avatar: String::new(),
            raw: String::new(),
        };
        let message = Message {
            id: 1,
            sender: String::new(),
            content: String::new(),
            time: String::new(),
        };
        let group = Group {
            id: "g1".into(),
            name: String::new(),
            member_count: 0,
        };

        assert_eq!(serialized_keys(&contact), Contact::COLUMNS);
        assert_eq!(serialized_keys(&message), Message::COLUMNS);
        assert_eq!(serialized_keys(&group), Group::COLUMNS);
    }

    #[test]
    fn test_group_serializes_member_count_camel_case() {
        let group = Group {
            id: "g1".into(),
            name: "Team".into(),
            member_count: 3,
        };
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["memberCount"], 3);
    }
}
