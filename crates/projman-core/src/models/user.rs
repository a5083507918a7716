//! User record as returned by the auth endpoints.
//!
//! The backend serializes users with `id`, `username`, `email` and
//! `created_at`. Any other field is kept in `extra` so the record survives a
//! trip through durable storage unchanged.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User identifier. Document ids are strings, test fixtures and other
/// backends use integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(id) => write!(f, "{}", id),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Int(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId::Text(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Kept as sent; see [`User::created_at_utc`] for the parsed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// A user carrying only an id.
    pub fn with_id(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    /// Name to show for this user: username, then email, then the id.
    pub fn display_name(&self) -> String {
        self.username
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.email.as_deref().filter(|s| !s.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Parse `created_at`. Accepts RFC 3339 and the naive ISO form the
    /// backend emits when timezone support is off (interpreted as UTC).
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_user_id_numeric_and_text() {
        let numeric: User = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(numeric.id, UserId::Int(1));

        let text: User = serde_json::from_str(r#"{"id": "65f1c0ffee"}"#).unwrap();
        assert_eq!(text.id, UserId::Text("65f1c0ffee".to_string()));
        assert_eq!(text.id.to_string(), "65f1c0ffee");
    }

    #[test]
    fn test_user_minimal_record_serializes_back_unchanged() {
        let user = User::with_id(1);
        assert_eq!(serde_json::to_string(&user).unwrap(), r#"{"id":1}"#);
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let json = r#"{"id": 7, "username": "ada", "role": "admin"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.username.as_deref(), Some("ada"));
        assert_eq!(user.extra.get("role"), Some(&Value::from("admin")));

        let back: Value = serde_json::to_value(&user).unwrap();
        assert_eq!(back["role"], "admin");
    }

    #[test]
    fn test_user_requires_id() {
        assert!(serde_json::from_str::<User>(r#"{"username": "ada"}"#).is_err());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = User::with_id(3);
        assert_eq!(user.display_name(), "3");

        user.email = Some("ada@example.com".to_string());
        assert_eq!(user.display_name(), "ada@example.com");

        user.username = Some("ada".to_string());
        assert_eq!(user.display_name(), "ada");
    }

    #[test]
    fn test_created_at_formats() {
        let mut user = User::with_id(1);
        user.created_at = Some("2024-03-05T10:20:30Z".to_string());
        let dt = user.created_at_utc().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));

        user.created_at = Some("2024-03-05T10:20:30.123456".to_string());
        let dt = user.created_at_utc().unwrap();
        assert_eq!(dt.hour(), 10);

        user.created_at = Some("yesterday".to_string());
        assert!(user.created_at_utc().is_none());
    }
}
