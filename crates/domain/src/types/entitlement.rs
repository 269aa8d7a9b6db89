//! Entitlement and permission records plus decoded remote responses

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::network::Network;

/// A user's granted access to an external network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Internal user identifier (the network's user key value)
    pub user_id: String,
    pub network: Network,
    /// Raw entitlement type as reported by the server (e.g. `WHATSAPPGROUPS`)
    pub entitlement_type: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// A finer-grained capability attached to an entitled user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub owner: String,
    pub permission: String,
    pub network: Network,
}

/// Decoded body of a classified remote response.
///
/// Servers answer with JSON most of the time but occasionally send plain-text
/// error bodies, so both shapes are kept. Text keeps its HTTP status since
/// it has no `status` field of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    /// 204 No Content
    Empty,
    Json(Value),
    Text { status: u16, body: String },
}

impl RemoteOutcome {
    /// Top-level field of a JSON object body.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Json(Value::Object(map)) => map.get(name),
            _ => None,
        }
    }

    /// Top-level field rendered as text. Strings are unquoted, numbers and
    /// booleans use their JSON form, null and containers yield `None`.
    pub fn field_text(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// `"<status> - <title>"` when the body is an error payload. A
    /// plain-text 4xx body stands in for the title.
    pub fn status_title(&self) -> Option<String> {
        if let Self::Text { status, body } = self {
            return (*status >= 400).then(|| format!("{status} - {}", body.trim()));
        }
        let status = self.field_text("status")?;
        let title = self.field_text("title")?;
        Some(format!("{status} - {title}"))
    }

    /// Status reported by an error payload, if the outcome is one.
    pub fn error_status(&self) -> Option<String> {
        match self {
            Self::Text { status, .. } if *status >= 400 => Some(status.to_string()),
            Self::Json(_) if self.is_error_payload() => self.field_text("status"),
            _ => None,
        }
    }

    /// Whether the body carries the `{status, title}` error shape or is a
    /// plain-text 4xx body.
    pub fn is_error_payload(&self) -> bool {
        self.status_title().is_some()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_title_reproduces_fields_verbatim() {
        let outcome = RemoteOutcome::Json(json!({"status": 409, "title": "Entitlement exists"}));
        assert_eq!(outcome.status_title().as_deref(), Some("409 - Entitlement exists"));
        assert!(outcome.is_error_payload());

        let textual = RemoteOutcome::Json(json!({"status": "BAD_REQUEST", "title": "Bad id"}));
        assert_eq!(textual.status_title().as_deref(), Some("BAD_REQUEST - Bad id"));
    }

    #[test]
    fn status_title_requires_both_fields() {
        let outcome = RemoteOutcome::Json(json!({"status": 404}));
        assert_eq!(outcome.status_title(), None);
        assert_eq!(RemoteOutcome::Empty.status_title(), None);
    }

    #[test]
    fn plain_text_error_bodies_keep_their_status() {
        let missing = RemoteOutcome::Text { status: 404, body: "User 999 not found\n".into() };
        assert_eq!(missing.status_title().as_deref(), Some("404 - User 999 not found"));
        assert_eq!(missing.error_status().as_deref(), Some("404"));
        assert!(missing.is_error_payload());

        let ok = RemoteOutcome::Text { status: 200, body: "created".into() };
        assert_eq!(ok.status_title(), None);
        assert_eq!(ok.error_status(), None);
    }

    #[test]
    fn error_status_of_json_payloads() {
        let conflict = RemoteOutcome::Json(json!({"status": 409, "title": "Conflict"}));
        assert_eq!(conflict.error_status().as_deref(), Some("409"));
        let record = RemoteOutcome::Json(json!({"status": "ACTIVE", "displayName": "Ada"}));
        assert_eq!(record.error_status(), None);
    }

    #[test]
    fn field_text_ignores_containers() {
        let outcome = RemoteOutcome::Json(json!({"displayName": "Ada", "tags": ["a"]}));
        assert_eq!(outcome.field_text("displayName").as_deref(), Some("Ada"));
        assert_eq!(outcome.field_text("tags"), None);
        assert_eq!(outcome.field_text("missing"), None);
    }
}
