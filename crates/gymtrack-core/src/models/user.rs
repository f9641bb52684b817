use serde::{Deserialize, Serialize};

use super::{deserialize_id, join_url};

/// The authenticated user.
///
/// Created from the `POST sessions` response or loaded from storage on
/// restore. Only the session manager holds the live copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Stored image file name, resolved with [`UserProfile::avatar_url`].
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Public URL of the avatar image, if the user has uploaded one.
    pub fn avatar_url(&self, base_url: &str) -> Option<String> {
        self.avatar
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(|a| join_url(base_url, &format!("avatar/{}", a)))
    }

    /// Name suitable for a greeting, falling back to the email.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    /// Copy of this profile with a new display name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy of this profile with a new avatar reference.
    pub fn with_avatar(&self, avatar: impl Into<String>) -> Self {
        Self {
            avatar: Some(avatar.into()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(avatar: Option<&str>) -> UserProfile {
        UserProfile {
            id: "1".to_string(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            avatar: avatar.map(String::from),
        }
    }

    #[test]
    fn test_deserialize_numeric_id() {
        let json = r#"{"id": 7, "name": "Ana", "email": "ana@example.com", "avatar": null}"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.avatar, None);
    }

    #[test]
    fn test_deserialize_minimal_user() {
        // Older API builds omit email and avatar
        let user: UserProfile = serde_json::from_str(r#"{"id": "1", "name": "A"}"#).unwrap();
        assert_eq!(user.id, "1");
        assert_eq!(user.name, "A");
        assert!(user.email.is_empty());
    }

    #[test]
    fn test_avatar_url() {
        assert_eq!(
            profile(Some("abc.png")).avatar_url("http://localhost:3333/"),
            Some("http://localhost:3333/avatar/abc.png".to_string())
        );
        assert_eq!(profile(None).avatar_url("http://localhost:3333"), None);
        assert_eq!(profile(Some("")).avatar_url("http://localhost:3333"), None);
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut user = profile(None);
        assert_eq!(user.display_name(), "Ana");
        user.name = "  ".to_string();
        assert_eq!(user.display_name(), "ana@example.com");
    }

    #[test]
    fn test_with_name_keeps_other_fields() {
        let updated = profile(Some("a.png")).with_name("Bia");
        assert_eq!(updated.name, "Bia");
        assert_eq!(updated.id, "1");
        assert_eq!(updated.avatar.as_deref(), Some("a.png"));
    }
}
