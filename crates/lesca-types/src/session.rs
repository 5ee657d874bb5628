//! Session record shape: a named, persistable bundle of cookies and storage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;

/// Metadata carried alongside a session's cookies and storage.
///
/// Timestamps are milliseconds since the epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionMetadata {
    #[serde(rename = "created")]
    pub created_at: i64,
    #[serde(rename = "lastUsed")]
    pub last_used_at: i64,
    #[serde(rename = "expires", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named scraping identity: cookies plus local/session storage snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub name: String,
    pub cookies: Vec<Cookie>,
    #[serde(rename = "localStorage")]
    pub local_storage: HashMap<String, String>,
    #[serde(rename = "sessionStorage")]
    pub session_storage: HashMap<String, String>,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    pub fn new(name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            name: name.into(),
            cookies: Vec::new(),
            local_storage: HashMap::new(),
            session_storage: HashMap::new(),
            metadata: SessionMetadata {
                created_at: now_ms,
                last_used_at: now_ms,
                expires_at: None,
                user_agent: None,
                description: None,
            },
        }
    }

    /// A record is expired iff `expires_at` is set and `now > expires_at`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.metadata.expires_at, Some(exp) if now_ms > exp)
    }

    /// Required-field shape check used to decide whether a parsed JSON blob
    /// is actually a valid session record or should be quarantined.
    pub fn has_valid_shape(value: &serde_json::Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        obj.get("name").and_then(|v| v.as_str()).is_some() && obj.get("cookies").map(|v| v.is_array()).unwrap_or(false)
    }
}

/// Sanitizes a session name for use as a filesystem path component: every
/// character outside `[A-Za-z0-9_-]` is replaced with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_traversal_characters() {
        assert_eq!(sanitize_name("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_name("my-session_1"), "my-session_1");
    }

    #[test]
    fn expiry_is_strictly_greater_than() {
        let mut record = SessionRecord::new("s1", 1000);
        record.metadata.expires_at = Some(2000);
        assert!(!record.is_expired(2000));
        assert!(record.is_expired(2001));
    }
}
