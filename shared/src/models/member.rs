//! Club member records and the family/guardian links between them

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberCategory {
    Adult,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Individual,
    Family,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Parent,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
    Suspended,
}

/// Member record (`members/{id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub club_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    pub member_category: MemberCategory,
    pub member_type: MemberType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_role: Option<FamilyRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guardian_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guardian_user_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub status: MemberStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
}

impl Member {
    /// Blank active member for a club; callers fill in the applicant fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        club_id: impl Into<String>,
        category: MemberCategory,
        member_type: MemberType,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            club_id: club_id.into(),
            club_name: None,
            member_category: category,
            member_type,
            family_role: None,
            guardian_ids: Vec::new(),
            guardian_user_ids: Vec::new(),
            guardian_name: None,
            guardian_phone: None,
            guardian_relation: None,
            date_of_birth: None,
            gender: None,
            phone_number: None,
            email: None,
            grade: None,
            user_id: None,
            status: MemberStatus::Active,
            approved_by: None,
            approved_at: None,
            created_at: now,
        }
    }

    /// Stamp approval metadata
    pub fn approved(mut self, by: &str, at: i64) -> Self {
        self.approved_by = Some(by.to_string());
        self.approved_at = Some(at);
        self
    }
}
