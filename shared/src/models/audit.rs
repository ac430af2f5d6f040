//! Audit Log Model

use serde::{Deserialize, Serialize};

use super::UserRole;

/// Auditable protocol mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    SubmitAdultRegistration,
    SubmitFamilyRegistration,
    ApproveAdultRegistration,
    ApproveFamilyRegistration,
    ApproveMemberRegistration,
    RejectRegistration,
    LinkUserMember,
    UnlinkUserMember,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitAdultRegistration => "SUBMIT_ADULT_REGISTRATION",
            Self::SubmitFamilyRegistration => "SUBMIT_FAMILY_REGISTRATION",
            Self::ApproveAdultRegistration => "APPROVE_ADULT_REGISTRATION",
            Self::ApproveFamilyRegistration => "APPROVE_FAMILY_REGISTRATION",
            Self::ApproveMemberRegistration => "APPROVE_MEMBER_REGISTRATION",
            Self::RejectRegistration => "REJECT_REGISTRATION",
            Self::LinkUserMember => "LINK_USER_MEMBER",
            Self::UnlinkUserMember => "UNLINK_USER_MEMBER",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record (`audit_logs/{id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub action: AuditAction,
    pub performed_by: String,
    pub performed_by_role: UserRole,
    pub target_type: String,
    pub target_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub timestamp: i64,
}
