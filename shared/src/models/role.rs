//! Role Model

use serde::{Deserialize, Serialize};

/// Account role, ordered roughly from most to least privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SuperAdmin,
    FederationAdmin,
    FederationSecretariat,
    CommitteeChair,
    CommitteeMember,
    ClubOwner,
    ClubManager,
    ClubStaff,
    MediaManager,
    HeadCoach,
    AssistantCoach,
    Member,
    Parent,
    Vendor,
}

impl UserRole {
    /// Top-level administrators bypass club scoping
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::FederationAdmin)
    }

    /// Roles allowed to approve, reject and link within their own club
    pub fn is_club_staff(&self) -> bool {
        matches!(
            self,
            Self::ClubOwner | Self::ClubManager | Self::HeadCoach | Self::AssistantCoach
        )
    }

    /// Roles whose profile is tied to a club (used for the club id backfill)
    pub fn is_club_role(&self) -> bool {
        matches!(
            self,
            Self::ClubOwner
                | Self::ClubManager
                | Self::ClubStaff
                | Self::HeadCoach
                | Self::AssistantCoach
                | Self::MediaManager
        )
    }

    /// Hierarchy level, higher includes the permissions of lower
    pub fn level(&self) -> u8 {
        match self {
            Self::SuperAdmin => 100,
            Self::FederationAdmin => 90,
            Self::FederationSecretariat => 80,
            Self::CommitteeChair => 70,
            Self::CommitteeMember => 60,
            Self::ClubOwner => 50,
            Self::ClubManager => 40,
            Self::HeadCoach => 35,
            Self::MediaManager => 30,
            Self::ClubStaff => 25,
            Self::AssistantCoach => 20,
            Self::Member => 10,
            Self::Parent => 5,
            Self::Vendor => 1,
        }
    }

    pub fn has_role_or_higher(&self, required: UserRole) -> bool {
        self.level() >= required.level()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::FederationAdmin => "FEDERATION_ADMIN",
            Self::FederationSecretariat => "FEDERATION_SECRETARIAT",
            Self::CommitteeChair => "COMMITTEE_CHAIR",
            Self::CommitteeMember => "COMMITTEE_MEMBER",
            Self::ClubOwner => "CLUB_OWNER",
            Self::ClubManager => "CLUB_MANAGER",
            Self::ClubStaff => "CLUB_STAFF",
            Self::MediaManager => "MEDIA_MANAGER",
            Self::HeadCoach => "HEAD_COACH",
            Self::AssistantCoach => "ASSISTANT_COACH",
            Self::Member => "MEMBER",
            Self::Parent => "PARENT",
            Self::Vendor => "VENDOR",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown role: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_and_staff_sets() {
        assert!(UserRole::SuperAdmin.is_admin());
        assert!(UserRole::FederationAdmin.is_admin());
        assert!(!UserRole::ClubOwner.is_admin());

        assert!(UserRole::ClubOwner.is_club_staff());
        assert!(UserRole::AssistantCoach.is_club_staff());
        assert!(!UserRole::ClubStaff.is_club_staff());
        assert!(!UserRole::Member.is_club_staff());
    }

    #[test]
    fn test_hierarchy() {
        assert!(UserRole::SuperAdmin.has_role_or_higher(UserRole::ClubOwner));
        assert!(!UserRole::Member.has_role_or_higher(UserRole::ClubStaff));
    }

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_string(&UserRole::ClubOwner).unwrap();
        assert_eq!(json, "\"CLUB_OWNER\"");
        assert_eq!("HEAD_COACH".parse::<UserRole>().unwrap(), UserRole::HeadCoach);
        assert!("COACH".parse::<UserRole>().is_err());
    }
}
