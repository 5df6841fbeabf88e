//! Record extraction service.
//!
//! Turns raw rows into contacts, groups, messages and the account owner.
//! The `extract_*` functions are pure single-pass transformations; the
//! `load_*` functions run the matching query on a [`Session`] first.

use crate::domain::config::ExtractConfig;
use crate::domain::{row_limit, AppError, Contact, Group, Message, Result, UserInfo};
use crate::infrastructure::sqlite_reader::{
    fetch_kv, fetch_kv_by_key, fetch_messages, KvRow, MessageRow,
};
use crate::infrastructure::Session;

use super::parser::{
    decode_info, decode_json_or_default, epoch_seconds_to_local_string, InfoPayload,
};

/// Group name used when the payload has none.
pub const GROUP_NAME_PLACEHOLDER: &str = "No name";

/// User name used when the payload has none.
pub const USER_NAME_PLACEHOLDER: &str = "Unknown";

/// Builds contacts from `key, val` rows.
///
/// Rows whose JSON does not parse become placeholders with empty fields.
/// Valid JSON keeps its text in `raw` even when it is not an object. Order
/// and duplicates are kept.
#[must_use]
pub fn extract_contacts(rows: &[KvRow]) -> Vec<Contact> {
    rows.iter()
        .map(|row| match decode_info(&row.val) {
            Ok(payload) => Contact {
                key: row.key.clone(),
                name: payload.z_name.unwrap_or_default(),
                avatar: payload.avatar.unwrap_or_default(),
                raw: row.val.clone(),
            },
            Err(e) => {
                tracing::debug!("Contact {} has malformed payload: {}", row.key, e);
                Contact {
                    key: row.key.clone(),
                    name: String::new(),
                    avatar: String::new(),
                    raw: String::new(),
                }
            }
        })
        .collect()
}

/// Builds groups from `key, val` rows whose `zType` equals `type_filter`.
///
/// A payload that does not parse, or is not a JSON object, has no `zType`,
/// so it never matches.
#[must_use]
pub fn extract_groups(rows: &[KvRow], type_filter: &str) -> Vec<Group> {
    rows.iter()
        .filter_map(|row| {
            let payload: InfoPayload = decode_json_or_default(&row.val);
            if payload.z_type.as_deref() != Some(type_filter) {
                return None;
            }

            Some(Group {
                id: row.key.clone(),
                name: payload
                    .z_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| GROUP_NAME_PLACEHOLDER.to_string()),
                member_count: payload.member_count.unwrap_or(0),
            })
        })
        .collect()
}

/// Builds messages from typed rows, rendering `time` in local time.
#[must_use]
pub fn extract_messages(rows: Vec<MessageRow>) -> Vec<Message> {
    rows.into_iter()
        .map(|row| Message {
            id: row.id,
            sender: row.sender,
            content: row.content,
            time: epoch_seconds_to_local_string(row.time),
        })
        .collect()
}

/// Finds the row keyed `uid` and decodes it.
///
/// Unlike bulk extraction this does not degrade: invalid JSON is an error.
///
/// # Errors
/// Returns `NotFound` if no row has the key, `MalformedRecord` if its JSON
/// does not parse.
pub fn extract_single_user_by_key(rows: &[KvRow], uid: &str) -> Result<UserInfo> {
    let row = rows
        .iter()
        .find(|r| r.key == uid)
        .ok_or_else(|| AppError::not_found(format!("info-cache entry for uid {uid}")))?;

    let payload = decode_info(&row.val).map_err(|e| AppError::MalformedRecord {
        key: uid.to_string(),
        message: e.to_string(),
    })?;

    Ok(UserInfo {
        uid: uid.to_string(),
        name: payload
            .z_name
            .unwrap_or_else(|| USER_NAME_PLACEHOLDER.to_string()),
        avatar: payload.avatar.unwrap_or_default(),
    })
}

/// Loads every contact of the info table.
///
/// # Errors
/// Returns error if the session is busy or the query fails.
pub async fn load_contacts(session: &Session, config: &ExtractConfig) -> Result<Vec<Contact>> {
    let conn = session.acquire()?;
    let rows = fetch_kv(&conn, &config.info_table, None)?;
    let contacts = extract_contacts(&rows);

    tracing::info!("Extracted {} contacts", contacts.len());
    Ok(contacts)
}

/// Loads groups from the first `group_scan_limit` rows of the info table.
///
/// # Errors
/// Returns error if the session is busy or the query fails.
pub async fn load_groups(session: &Session, config: &ExtractConfig) -> Result<Vec<Group>> {
    let conn = session.acquire()?;
    let rows = fetch_kv(&conn, &config.info_table, row_limit(config.group_scan_limit))?;
    let groups = extract_groups(&rows, &config.group_type);

    tracing::info!("Extracted {} groups from {} rows", groups.len(), rows.len());
    Ok(groups)
}

/// Loads up to `message_limit` messages.
///
/// # Errors
/// Returns error if the session is busy or the query fails.
pub async fn load_messages(session: &Session, config: &ExtractConfig) -> Result<Vec<Message>> {
    let conn = session.acquire()?;
    let rows = fetch_messages(&conn, &config.messages_table, row_limit(config.message_limit))?;
    let messages = extract_messages(rows);

    tracing::info!("Extracted {} messages", messages.len());
    Ok(messages)
}

/// Looks up the account owner by uid.
///
/// # Errors
/// Returns `NotFound`, `MalformedRecord`, or a query error.
pub async fn find_user(session: &Session, config: &ExtractConfig, uid: &str) -> Result<UserInfo> {
    let conn = session.acquire()?;
    let rows = fetch_kv_by_key(&conn, &config.info_table, uid)?;
    extract_single_user_by_key(&rows, uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite_reader::tests::open_fixture;
    use tempfile::tempdir;

    fn kv(key: &str, val: &str) -> KvRow {
        KvRow {
            key: key.into(),
            val: val.into(),
        }
    }

    #[test]
    fn test_contact_from_valid_json() {
        let val = r#"{"zName":"Alice","avatar":"http://x/a.png"}"#;
        let contacts = extract_contacts(&[kv("u1", val)]);

        assert_eq!(
            contacts,
            vec![Contact {
                key: "u1".into(),
                name: "Alice".into(),
                avatar: "http://x/a.png".into(),
                raw: val.into(),
            }]
        );
    }

    #[test]
    fn test_contact_from_malformed_json_degrades() {
        let contacts = extract_contacts(&[kv("u2", "{broken")]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].key, "u2");
        assert_eq!(contacts[0].name, "");
        assert_eq!(contacts[0].avatar, "");
        assert_eq!(contacts[0].raw, "");
    }

    #[test]
    fn test_contact_from_json_array_keeps_raw() {
        let contacts = extract_contacts(&[kv("u9", "[1,2]")]);
        assert_eq!(
            contacts,
            vec![Contact {
                key: "u9".into(),
                name: String::new(),
                avatar: String::new(),
                raw: "[1,2]".into(),
            }]
        );
    }

    #[test]
    fn test_contact_missing_keys_default_empty() {
        let contacts = extract_contacts(&[kv("u3", "{}")]);
        assert_eq!(contacts[0].name, "");
        assert_eq!(contacts[0].raw, "{}");
    }

    #[test]
    fn test_contacts_keep_order_and_duplicates() {
        let rows = [kv("b", "{}"), kv("a", "{}"), kv("b", "{}")];
        let keys: Vec<_> = extract_contacts(&rows).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_groups_filter_and_defaults() {
        let rows = [
            kv("g1", r#"{"zType":"group","zName":"Family","memberCount":5}"#),
            kv("g2", r#"{"zType":"group"}"#),
            kv("u1", r#"{"zType":"user","zName":"Bob"}"#),
            kv("bad", "not json"),
        ];
        let groups = extract_groups(&rows, "group");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Family");
        assert_eq!(groups[0].member_count, 5);
        assert_eq!(groups[1].name, GROUP_NAME_PLACEHOLDER);
        assert_eq!(groups[1].member_count, 0);
    }

    #[test]
    fn test_groups_ignore_array_payloads() {
        let rows = [kv("a1", r#"["Fam","","group",3]"#)];
        assert!(extract_groups(&rows, "group").is_empty());
    }

    #[test]
    fn test_groups_custom_filter() {
        let rows = [kv("c1", r#"{"zType":"community","zName":"C"}"#)];
        assert!(extract_groups(&rows, "group").is_empty());
        assert_eq!(extract_groups(&rows, "community").len(), 1);
    }

    #[test]
    fn test_messages_time_conversion() {
        let rows = vec![MessageRow {
            id: 7,
            sender: "A".into(),
            content: "hi".into(),
            time: 1_700_000_000,
        }];
        let messages = extract_messages(rows);
        assert_eq!(messages[0].id, 7);
        assert_eq!(messages[0].time, epoch_seconds_to_local_string(1_700_000_000));
    }

    #[test]
    fn test_single_user_found() {
        let rows = [kv("u1", r#"{"zName":"Alice","avatar":"a.png"}"#)];
        let user = extract_single_user_by_key(&rows, "u1").unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.avatar, "a.png");
    }

    #[test]
    fn test_single_user_default_name() {
        let rows = [kv("u1", "{}")];
        let user = extract_single_user_by_key(&rows, "u1").unwrap();
        assert_eq!(user.name, USER_NAME_PLACEHOLDER);
    }

    #[test]
    fn test_single_user_non_object_json_uses_defaults() {
        let rows = [kv("u1", "[]")];
        let user = extract_single_user_by_key(&rows, "u1").unwrap();
        assert_eq!(user.name, USER_NAME_PLACEHOLDER);
        assert_eq!(user.avatar, "");
    }

    #[test]
    fn test_single_user_not_found() {
        assert!(matches!(
            extract_single_user_by_key(&[], "u1"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_single_user_malformed_fails() {
        let rows = [kv("u1", "{nope")];
        assert!(matches!(
            extract_single_user_by_key(&rows, "u1"),
            Err(AppError::MalformedRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_from_session() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let config = ExtractConfig::default();

        let contacts = load_contacts(&session, &config).await.unwrap();
        assert_eq!(contacts.len(), 5);

        let groups = load_groups(&session, &config).await.unwrap();
        assert_eq!(groups.len(), 2);

        let messages = load_messages(&session, &config).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi \"there\"");

        let user = find_user(&session, &config, "u1").await.unwrap();
        assert_eq!(user.name, "Alice");

        assert!(matches!(
            find_user(&session, &config, "u2").await,
            Err(AppError::MalformedRecord { .. })
        ));
        assert!(matches!(
            find_user(&session, &config, "missing").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_missing_table() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let config = ExtractConfig {
            messages_table: "chat".into(),
            ..Default::default()
        };

        assert!(matches!(
            load_messages(&session, &config).await,
            Err(AppError::Query { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_overlap() {
        let dir = tempdir().unwrap();
        let session = open_fixture(&dir);
        let _held = session.acquire().unwrap();

        assert!(matches!(
            load_contacts(&session, &ExtractConfig::default()).await,
            Err(AppError::Busy)
        ));
    }
}
