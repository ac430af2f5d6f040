//! Document schemas, one fixed shape per collection

pub mod audit;
pub mod club;
pub mod member;
pub mod registration;
pub mod role;
pub mod user;

pub use audit::{AuditAction, AuditLogEntry};
pub use club::Club;
pub use member::{FamilyRole, Member, MemberCategory, MemberStatus, MemberType};
pub use registration::{
    AdultRegistrationRequest, Applicant, ChildApplicant, ClubOwnerRequest, Decision,
    ExternalGuardian, FamilyRegistrationRequest, MemberRegistrationRequest, RequestHeader,
    RequestStatus, RequestType, SuperAdminRequest,
};
pub use role::UserRole;
pub use user::{AuthIdentity, CallerIdentity, User, UserStatus};

/// Collection names
pub mod collections {
    pub const USERS: &str = "users";
    pub const MEMBERS: &str = "members";
    pub const ADULT_REGISTRATION_REQUESTS: &str = "adultRegistrationRequests";
    pub const FAMILY_REGISTRATION_REQUESTS: &str = "familyRegistrationRequests";
    pub const MEMBER_REGISTRATION_REQUESTS: &str = "memberRegistrationRequests";
    pub const CLUB_OWNER_REQUESTS: &str = "clubOwnerRequests";
    pub const SUPER_ADMIN_REQUESTS: &str = "superAdminRequests";
    pub const CLUBS: &str = "clubs";
    pub const AUDIT_LOGS: &str = "audit_logs";
}
