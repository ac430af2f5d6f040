//! User Model

use serde::{Deserialize, Serialize};

use super::UserRole;

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// User profile document (`users/{uid}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Set on the degraded profile handed out when the profile read failed
    /// but the session was still valid. Never persisted.
    #[serde(
        default,
        rename = "_profileError",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub profile_error: bool,
}

impl User {
    pub fn is_pending(&self) -> bool {
        self.status == UserStatus::Pending
    }
}

/// Verified identity of the caller of a protocol mutation
///
/// Produced by the identity provider (JWT verification); carries only what
/// authorization needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub uid: String,
    pub role: UserRole,
    #[serde(default)]
    pub club_id: Option<String>,
}

impl CallerIdentity {
    pub fn new(uid: impl Into<String>, role: UserRole, club_id: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            role,
            club_id: club_id.map(str::to_string),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_club_staff(&self) -> bool {
        self.role.is_club_staff()
    }
}

/// Freshly authenticated identity handed to the profile bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Sign-in provider id, e.g. `google.com` or `password`
    #[serde(default)]
    pub provider_id: Option<String>,
}

impl AuthIdentity {
    /// Display name, falling back to the local part of the email
    pub fn fallback_display_name(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn provider(&self) -> &'static str {
        match self.provider_id.as_deref() {
            Some("google.com") => "google",
            _ => "email",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_format() {
        let json = serde_json::json!({
            "uid": "u1",
            "email": "a@b.c",
            "displayName": "A",
            "role": "MEMBER",
            "status": "pending",
            "linkedMemberId": null,
            "photoURL": "https://example.com/a.png",
            "createdAt": 1,
            "updatedAt": 2
        });
        let user: User = serde_json::from_value(json).unwrap();
        assert_eq!(user.linked_member_id, None);
        assert_eq!(user.photo_url.as_deref(), Some("https://example.com/a.png"));
        assert!(user.is_pending());
        assert!(!user.profile_error);

        let back = serde_json::to_value(&user).unwrap();
        assert!(back.get("_profileError").is_none());
        assert!(back.get("linkedMemberId").is_none());
    }

    #[test]
    fn test_fallback_display_name() {
        let identity = AuthIdentity {
            uid: "u1".into(),
            email: "jane.doe@example.com".into(),
            display_name: None,
            phone_number: None,
            photo_url: None,
            provider_id: Some("google.com".into()),
        };
        assert_eq!(identity.fallback_display_name(), "jane.doe");
        assert_eq!(identity.provider(), "google");
    }
}
