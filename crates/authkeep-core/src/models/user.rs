use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity returned by the backend for a token.
///
/// The session core treats this as an opaque blob: it is stored on
/// successful identity resolution and handed to observers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Value);

/// Fields checked, in order, when picking a label for display
const DISPLAY_NAME_FIELDS: &[&str] = &["name", "username", "email"];

impl UserProfile {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Best-effort human label for CLI output. Never used for session logic.
    pub fn display_name(&self) -> Option<&str> {
        DISPLAY_NAME_FIELDS
            .iter()
            .find_map(|field| self.0.get(field).and_then(Value::as_str))
    }
}

impl From<Value> for UserProfile {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_name_prefers_name() {
        let user = UserProfile::new(json!({"name": "alice", "email": "a@example.com"}));
        assert_eq!(user.display_name(), Some("alice"));
    }

    #[test]
    fn test_display_name_falls_back() {
        let user = UserProfile::new(json!({"email": "bob@example.com"}));
        assert_eq!(user.display_name(), Some("bob@example.com"));

        let anonymous = UserProfile::new(json!({"id": 7}));
        assert_eq!(anonymous.display_name(), None);
    }

    #[test]
    fn test_profile_round_trips_unchanged() {
        let raw = json!({"name": "carol", "roles": ["admin"], "nested": {"a": 1}});
        let user: UserProfile = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.into_value(), raw);
    }
}
