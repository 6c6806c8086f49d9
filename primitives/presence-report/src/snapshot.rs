//! Lenient decoding of the presence API document.
//!
//! The document is expected to look like:
//!
//! ```json
//! {
//!   "members": [
//!     { "userData": { "name": "Alice" }, "presence": { "lastOnline": "2024-07-01T10:30:00Z" } },
//!     { "userData": { "name": "Bob" },   "presence": { "userPresenceType": 1 } }
//!   ]
//! }
//! ```
//!
//! A body that is not JSON, or that has no `members` array, is an error so the
//! caller can keep its previous report. Anything malformed inside the array
//! degrades to "no data" for the affected member or field.

use crate::model::{MemberRecord, Presence, Snapshot};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Name used when a member carries no usable `userData.name`.
pub const UNKNOWN_NAME: &str = "unknown";

/// Zone-less date-time layouts read as UTC.
const NAIVE_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// `userPresenceType` value meaning "on the website".
const WEBSITE_PRESENCE_TYPE: f64 = 1.0;

/// Errors produced while decoding a snapshot document.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot document: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("snapshot document has no members array")]
    MissingMembers,
}

/// A member entry as it appears on the wire.
#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(rename = "userData", default)]
    user_data: Value,

    #[serde(default)]
    presence: Value,
}

impl Snapshot {
    /// Decodes a snapshot from a JSON response body.
    pub fn from_json(body: &str) -> Result<Self, SnapshotError> {
        let document: Value = serde_json::from_str(body)?;
        Self::from_value(document)
    }

    /// Decodes a snapshot from an already parsed document.
    ///
    /// Fails only when the top level is not an object carrying a `members`
    /// array; individual entries never fail the whole document.
    pub fn from_value(document: Value) -> Result<Self, SnapshotError> {
        let entries = match document {
            Value::Object(mut map) => match map.remove("members") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(SnapshotError::MissingMembers),
            },
            _ => return Err(SnapshotError::MissingMembers),
        };

        let members = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<RawMember>(entry) {
                Ok(raw) => Some(raw.into_record()),
                Err(e) => {
                    tracing::debug!(index, error = %e, "skipping malformed member entry");
                    None
                }
            })
            .collect();

        Ok(Self { members })
    }
}

impl RawMember {
    fn into_record(self) -> MemberRecord {
        let name = self
            .user_data
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_NAME);

        MemberRecord {
            name: name.to_string(),
            presence: decode_presence(&self.presence),
        }
    }
}

fn decode_presence(raw: &Value) -> Option<Presence> {
    let presence = raw.as_object()?;

    let on_website = presence
        .get("userPresenceType")
        .and_then(Value::as_f64)
        .is_some_and(|kind| kind == WEBSITE_PRESENCE_TYPE);
    if on_website {
        return Some(Presence::OnWebsite);
    }

    Some(Presence::Timestamped {
        last_online: presence.get("lastOnline").and_then(parse_timestamp),
    })
}

/// Reads a `lastOnline` value.
///
/// Accepts RFC 3339 strings, zone-less date-times with a `T` or space
/// separator, bare `YYYY-MM-DD` dates (midnight), all taken as UTC, and epoch
/// milliseconds. Empty strings, zero and anything unreadable yield `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_timestamp_str(text.trim()),
        Value::Number(number) => {
            let millis = number.as_f64()?;
            if !millis.is_finite() || millis == 0.0 {
                return None;
            }
            DateTime::from_timestamp_millis(millis as i64)
        }
        _ => None,
    }
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
