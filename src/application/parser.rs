//! JSON decoding for Zalo payloads.
//!
//! Handles conversion from the JSON stored in `val` columns and in
//! `database-config.json` to plain values. Fields are decoded one by one, so
//! a single field with an unexpected type falls back to its default without
//! discarding the rest of the payload.

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::{AppError, Result};

/// Config field holding a JSON-encoded object keyed by user id.
const UID_MAP_FIELD: &str = "sh_sqlite_m_d";

/// Display format for message times.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Payload of an `info-cache` row, for both users and groups.
#[derive(Debug, Default, Deserialize)]
pub struct InfoPayload {
    #[serde(rename = "zName", default, deserialize_with = "lenient")]
    pub z_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub avatar: Option<String>,
    #[serde(rename = "zType", default, deserialize_with = "lenient")]
    pub z_type: Option<String>,
    #[serde(rename = "memberCount", default, deserialize_with = "lenient")]
    pub member_count: Option<u64>,
}

/// Accepts any JSON for the field and keeps it only if it has type `T`.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Parses a JSON payload.
///
/// # Errors
/// Returns error if `raw` is not valid JSON of the expected shape.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(AppError::json_parse)
}

/// Parses an `info-cache` payload.
///
/// Valid JSON that is not an object decodes to the default payload; fields
/// are only ever read by name, never by position.
///
/// # Errors
/// Returns `JsonParse` if `raw` is not valid JSON.
pub fn decode_info(raw: &str) -> Result<InfoPayload> {
    decode_json::<Value>(raw).map(payload_from_value)
}

/// Parses a JSON object payload, falling back to `T::default()` when it is
/// malformed or not an object.
pub fn decode_json_or_default<T: DeserializeOwned + Default>(raw: &str) -> T {
    match decode_json::<Value>(raw) {
        Ok(value) => payload_from_value(value),
        Err(e) => {
            tracing::debug!("Using defaults for malformed payload: {}", e);
            T::default()
        }
    }
}

fn payload_from_value<T: DeserializeOwned + Default>(value: Value) -> T {
    match value {
        Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    }
}

/// Renders epoch seconds in the local time zone.
///
/// Out-of-range values render as an empty string.
#[must_use]
pub fn epoch_seconds_to_local_string(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(String::new, |utc| {
        utc.with_timezone(&Local).format(TIME_FORMAT).to_string()
    })
}

/// Extracts the active user id from `database-config.json` content.
///
/// The `sh_sqlite_m_d` field holds a JSON-encoded object; its first key
/// (in document order) is the uid.
///
/// # Errors
/// Returns `JsonParse` for invalid JSON and `NotFound` when the field or the
/// uid is missing.
pub fn extract_active_uid(config_json: &str) -> Result<String> {
    let config: Value = decode_json(config_json)?;

    let field = config
        .get(UID_MAP_FIELD)
        .ok_or_else(|| AppError::not_found(format!("{UID_MAP_FIELD} in database config")))?;

    let uid_map = match field {
        Value::String(encoded) => decode_json::<Value>(encoded)?,
        Value::Object(_) => field.clone(),
        _ => Value::Null,
    };

    uid_map
        .as_object()
        .and_then(|map| map.keys().next())
        .filter(|uid| !uid.is_empty())
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("uid in {UID_MAP_FIELD}")))
}
