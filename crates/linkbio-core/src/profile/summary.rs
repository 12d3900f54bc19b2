//! Read-only views: profile listings and profile members

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Document, Fields};

/// Listing view of a profile document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub title: Option<String>,
    /// User id of the profile owner (`teamMasterId`)
    pub master_id: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
}

impl ProfileSummary {
    pub fn from_document(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            title: string_field(&document.fields, "title"),
            master_id: string_field(&document.fields, "teamMasterId"),
            created_on: document.field("createdOn").and_then(parse_timestamp),
        }
    }
}

/// A user attached to a profile
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// User document id
    pub id: String,
    /// Every field of the user document
    pub fields: Fields,
    pub created_on: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    /// `addedToContacts` of the member's active profile
    pub added_to_contacts: Option<Value>,
    /// `contacts` of the member's active profile
    pub contacts_count: Option<Value>,
}

impl Member {
    pub fn from_document(document: Document) -> Self {
        let Document { id, fields } = document;
        Self {
            created_on: fields.get("createdOn").and_then(parse_timestamp),
            last_login: fields.get("lastLogin").and_then(parse_timestamp),
            id,
            fields,
            added_to_contacts: None,
            contacts_count: None,
        }
    }

    /// Whether this member owns the profile (`isTeamMaster`)
    pub fn is_master(&self) -> bool {
        self.fields.get("isTeamMaster") == Some(&Value::Bool(true))
    }

    /// Id of the member's active profile under `users/{id}/profiles`
    pub fn active_profile_id(&self) -> Option<&str> {
        self.fields
            .get("activeProfileId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }

    /// Copy the contact counters of the member's active profile
    pub fn apply_active_profile(&mut self, profile: &Document) {
        self.added_to_contacts = profile.field("addedToContacts").cloned();
        self.contacts_count = profile.field("contacts").cloned();
    }
}

/// Read a stored timestamp
///
/// Accepts RFC 3339 strings, integer epoch seconds and timestamp objects
/// (`{"seconds", "nanoseconds"}`, also with leading underscores).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}

fn string_field(fields: &Fields, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps() {
        let expected = Utc.timestamp_opt(1_700_000_000, 0).single();

        assert_eq!(parse_timestamp(&json!({"seconds": 1_700_000_000, "nanoseconds": 0})), expected);
        assert_eq!(parse_timestamp(&json!({"_seconds": 1_700_000_000})), expected);
        assert_eq!(parse_timestamp(&json!(1_700_000_000)), expected);
        assert_eq!(parse_timestamp(&json!("2023-11-14T22:13:20Z")), expected);

        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!({"nanoseconds": 5})), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn summary_keeps_listing_fields_only() {
        let fields = json!({
            "title": "Cafe",
            "teamMasterId": "u1",
            "createdOn": {"seconds": 0},
            "aboutData": {"text": "hi"}
        });
        let document = Document::new("t1", fields.as_object().cloned().unwrap());

        let summary = ProfileSummary::from_document(&document);
        assert_eq!(summary.id, "t1");
        assert_eq!(summary.title.as_deref(), Some("Cafe"));
        assert_eq!(summary.master_id.as_deref(), Some("u1"));
        assert_eq!(summary.created_on, Utc.timestamp_opt(0, 0).single());
    }

    #[test]
    fn member_flags() {
        let fields = json!({"isTeamMaster": true, "activeProfileId": "a/b"});
        let member = Member::from_document(Document::new("u1", fields.as_object().cloned().unwrap()));

        assert!(member.is_master());
        assert_eq!(member.active_profile_id(), None);
    }
}
