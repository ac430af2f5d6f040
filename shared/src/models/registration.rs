//! Registration Request Models

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FamilyRole, MemberType, collections};

/// Lifecycle of a registration request; approved and rejected are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration request variant, selects the backing collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Adult,
    Family,
    Member,
}

impl RequestType {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Adult => collections::ADULT_REGISTRATION_REQUESTS,
            Self::Family => collections::FAMILY_REGISTRATION_REQUESTS,
            Self::Member => collections::MEMBER_REGISTRATION_REQUESTS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adult => "adult",
            Self::Family => "family",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adult" => Ok(Self::Adult),
            "family" => Ok(Self::Family),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown request type: {other}")),
        }
    }
}

/// Fields every request variant shares; enough for guard checks and rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeader {
    pub club_id: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// Adult applicant details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChildApplicant {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

/// Guardian who is not registering as a member themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExternalGuardian {
    #[validate(length(min = 1, message = "guardian name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

/// Bookkeeping fields stamped by approval or rejection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,
}

/// `adultRegistrationRequests/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdultRegistrationRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    pub club_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    pub status: RequestStatus,
    #[serde(flatten)]
    pub applicant: Applicant,
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_member_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// `familyRegistrationRequests/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRegistrationRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    pub club_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub parents: Vec<Applicant>,
    #[serde(default)]
    pub children: Vec<ChildApplicant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_guardian: Option<ExternalGuardian>,
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_member_ids: Vec<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// `memberRegistrationRequests/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRegistrationRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub club_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<MemberType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_role: Option<FamilyRole>,
    pub status: RequestStatus,
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_member_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl MemberRegistrationRequest {
    /// User the approval should activate, when named directly
    pub fn target_user(&self) -> Option<&str> {
        self.user_id.as_deref().or(self.requested_by.as_deref())
    }
}

/// Club owner application, looked up by email during profile bootstrap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubOwnerRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub club_name: String,
    pub status: RequestStatus,
}

/// Super admin application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperAdminRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub status: RequestStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adult_request_flattened_shape() {
        let json = serde_json::json!({
            "id": "r1",
            "requestedBy": "u1",
            "clubId": "c1",
            "status": "pending",
            "name": "Kim",
            "email": "kim@example.com",
            "createdAt": 10
        });
        let request: AdultRegistrationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.applicant.name, "Kim");
        assert_eq!(request.decision, Decision::default());

        let header: RequestHeader =
            serde_json::from_value(serde_json::to_value(&request).unwrap()).unwrap();
        assert_eq!(header.club_id, "c1");
        assert_eq!(header.requested_by.as_deref(), Some("u1"));
    }

    #[test]
    fn test_request_type_collections() {
        assert_eq!(RequestType::Adult.collection(), "adultRegistrationRequests");
        assert_eq!(RequestType::Family.collection(), "familyRegistrationRequests");
        assert_eq!("member".parse::<RequestType>().unwrap(), RequestType::Member);
        assert!("club".parse::<RequestType>().is_err());
    }

    #[test]
    fn test_applicant_validation() {
        let applicant = Applicant {
            name: String::new(),
            birth_date: None,
            gender: None,
            phone_number: None,
            email: Some("not-an-email".into()),
        };
        let errors = applicant.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
    }
}
