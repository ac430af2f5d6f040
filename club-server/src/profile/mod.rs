//! Profile resolution and first sign-in bootstrap
//!
//! A freshly authenticated identity without a `users` document gets one
//! synthesized from whichever approval candidate matches its email, in the
//! fixed priority club owner > super admin > member registration. With no
//! candidate the profile is a pending MEMBER.
//!
//! - [`ProfileResolver`] - cached resolve-or-create entry point
//! - [`ProfileCache`] - TTL cache invalidated synchronously by user commits
//! - [`ProfileStore`] / [`SessionControl`] - collaborator seams

mod cache;
mod resolver;
mod store;

pub use cache::{ProfileCache, ReadTicket};
pub use resolver::ProfileResolver;

use async_trait::async_trait;
use serde_json::Value;
use shared::AppResult;
use shared::models::{
    AuthIdentity, ClubOwnerRequest, MemberRegistrationRequest, RequestStatus, SuperAdminRequest,
    User, UserRole, UserStatus,
};

/// Profile persistence as the bootstrap flow needs it
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_user(&self, uid: &str) -> AppResult<Option<User>>;

    async fn create_user(&self, user: &User) -> AppResult<()>;

    async fn update_user(&self, uid: &str, patch: Value) -> AppResult<()>;

    /// Pending or approved club owner application for an email
    async fn find_club_owner_request(&self, email: &str) -> AppResult<Option<ClubOwnerRequest>>;

    async fn find_approved_super_admin_request(
        &self,
        email: &str,
    ) -> AppResult<Option<SuperAdminRequest>>;

    async fn find_approved_member_request(
        &self,
        email: &str,
    ) -> AppResult<Option<MemberRegistrationRequest>>;

    async fn find_club_id_by_name(&self, club_name: &str) -> AppResult<Option<String>>;
}

/// Session operations of the identity provider
#[async_trait]
pub trait SessionControl: Send + Sync {
    /// Force a token refresh; an error means the session is no longer valid
    async fn refresh_token(&self, uid: &str) -> AppResult<()>;

    async fn sign_out(&self, uid: &str) -> AppResult<()>;
}

/// Application that can seed a new profile
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalCandidate {
    ClubOwner(ClubOwnerRequest),
    SuperAdmin(SuperAdminRequest),
    Member(MemberRegistrationRequest),
}

/// Pick at most one candidate, club owner first, then super admin, then member
pub fn pick_candidate(
    club_owner: Option<ClubOwnerRequest>,
    super_admin: Option<SuperAdminRequest>,
    member: Option<MemberRegistrationRequest>,
) -> Option<ApprovalCandidate> {
    club_owner
        .map(ApprovalCandidate::ClubOwner)
        .or_else(|| super_admin.map(ApprovalCandidate::SuperAdmin))
        .or_else(|| member.map(ApprovalCandidate::Member))
}

/// Build the profile document for a first sign-in
pub fn synthesize_profile(
    identity: &AuthIdentity,
    candidate: Option<&ApprovalCandidate>,
    resolved_club_id: Option<String>,
    now: i64,
) -> User {
    let mut user = User {
        uid: identity.uid.clone(),
        email: identity.email.clone(),
        display_name: identity.fallback_display_name(),
        role: UserRole::Member,
        status: UserStatus::Pending,
        club_id: None,
        club_name: None,
        linked_member_id: None,
        phone_number: identity.phone_number.clone(),
        photo_url: identity.photo_url.clone(),
        provider: Some(identity.provider().to_string()),
        created_at: now,
        updated_at: now,
        profile_error: false,
    };

    let (name, phone) = match candidate {
        Some(ApprovalCandidate::ClubOwner(r)) => (r.name.clone(), r.phone_number.clone()),
        Some(ApprovalCandidate::SuperAdmin(r)) => (r.name.clone(), r.phone_number.clone()),
        Some(ApprovalCandidate::Member(r)) => (Some(r.name.clone()), r.phone_number.clone()),
        None => (None, None),
    };
    // Applicant details take precedence over the identity provider's
    if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
        user.display_name = name;
    }
    if phone.is_some() {
        user.phone_number = phone;
    }

    match candidate {
        Some(ApprovalCandidate::ClubOwner(request)) => {
            user.role = UserRole::ClubOwner;
            user.status = if request.status == RequestStatus::Approved {
                UserStatus::Active
            } else {
                UserStatus::Pending
            };
            user.club_name = Some(request.club_name.clone());
            user.club_id = resolved_club_id;
        }
        Some(ApprovalCandidate::SuperAdmin(_)) => {
            user.role = UserRole::SuperAdmin;
            user.status = UserStatus::Active;
        }
        Some(ApprovalCandidate::Member(request)) => {
            user.role = UserRole::Member;
            user.status = UserStatus::Active;
            user.club_id = Some(request.club_id.clone());
            user.club_name = request.club_name.clone();
        }
        None => {}
    }
    user
}

/// Minimal profile handed out when the profile read failed but the session
/// is still valid
pub fn degraded_profile(identity: &AuthIdentity, now: i64) -> User {
    let mut user = synthesize_profile(identity, None, None, now);
    user.profile_error = true;
    user
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AuthIdentity {
        AuthIdentity {
            uid: "u1".into(),
            email: "owner@example.com".into(),
            display_name: None,
            phone_number: None,
            photo_url: None,
            provider_id: None,
        }
    }

    fn club_owner(status: RequestStatus) -> ClubOwnerRequest {
        ClubOwnerRequest {
            email: "owner@example.com".into(),
            name: Some("Owner".into()),
            phone_number: Some("010".into()),
            club_name: "Harbor".into(),
            status,
        }
    }

    fn super_admin() -> SuperAdminRequest {
        SuperAdminRequest {
            email: "owner@example.com".into(),
            name: None,
            phone_number: None,
            status: RequestStatus::Approved,
        }
    }

    #[test]
    fn test_club_owner_wins_over_super_admin() {
        let picked = pick_candidate(Some(club_owner(RequestStatus::Pending)), Some(super_admin()), None);
        assert!(matches!(picked, Some(ApprovalCandidate::ClubOwner(_))));

        let picked = pick_candidate(None, Some(super_admin()), None);
        assert!(matches!(picked, Some(ApprovalCandidate::SuperAdmin(_))));
        assert!(pick_candidate(None, None, None).is_none());
    }

    #[test]
    fn test_club_owner_status_mirrors_request() {
        let pending = ApprovalCandidate::ClubOwner(club_owner(RequestStatus::Pending));
        let user = synthesize_profile(&identity(), Some(&pending), Some("c1".into()), 5);
        assert_eq!(user.role, UserRole::ClubOwner);
        assert_eq!(user.status, UserStatus::Pending);
        assert_eq!(user.club_id.as_deref(), Some("c1"));
        assert_eq!(user.club_name.as_deref(), Some("Harbor"));
        assert_eq!(user.display_name, "Owner");
        assert_eq!(user.phone_number.as_deref(), Some("010"));

        let approved = ApprovalCandidate::ClubOwner(club_owner(RequestStatus::Approved));
        let user = synthesize_profile(&identity(), Some(&approved), None, 5);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.club_id, None);
    }

    #[test]
    fn test_default_and_degraded_profiles() {
        let user = synthesize_profile(&identity(), None, None, 1);
        assert_eq!((user.role, user.status), (UserRole::Member, UserStatus::Pending));
        assert_eq!(user.display_name, "owner");
        assert!(!user.profile_error);

        let degraded = degraded_profile(&identity(), 1);
        assert!(degraded.profile_error);
        assert_eq!(degraded.status, UserStatus::Pending);
    }
}
