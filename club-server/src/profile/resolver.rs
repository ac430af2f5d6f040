use std::sync::Arc;

use serde_json::json;
use shared::models::{AuthIdentity, User, UserStatus};
use shared::util::now_millis;
use shared::{AppError, AppResult};

use super::{
    ApprovalCandidate, ProfileCache, ProfileStore, SessionControl, degraded_profile,
    pick_candidate, synthesize_profile,
};

/// Resolve-or-create entry point for authenticated identities
#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn ProfileStore>,
    session: Arc<dyn SessionControl>,
    cache: ProfileCache,
}

impl ProfileResolver {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        session: Arc<dyn SessionControl>,
        cache: ProfileCache,
    ) -> Self {
        Self {
            store,
            session,
            cache,
        }
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Return the profile of `identity`, creating it on first sign-in.
    ///
    /// When the profile read itself fails the session is probed: a session
    /// that still refreshes gets a degraded, uncached profile; one that
    /// does not is signed out and `SessionExpired` is returned.
    pub async fn resolve_or_create_profile(&self, identity: &AuthIdentity) -> AppResult<User> {
        let ticket = self.cache.read_ticket(&identity.uid);
        if let Some(user) = self.cache.get(&identity.uid) {
            return Ok(user);
        }

        let user = match self.store.get_user(&identity.uid).await {
            Ok(Some(user)) => user,
            Ok(None) => self.bootstrap(identity).await?,
            Err(e) => return self.recover_from_read_failure(identity, e).await,
        };

        // Our own create or backfill commit also bumps the generation, so
        // those profiles are cached by the next resolve instead
        let user = self.backfill_club_id(user).await;
        self.cache.insert(user.clone(), ticket);
        Ok(user)
    }

    async fn bootstrap(&self, identity: &AuthIdentity) -> AppResult<User> {
        let email = identity.email.as_str();
        let (club_owner, super_admin, member) = futures::join!(
            self.store.find_club_owner_request(email),
            self.store.find_approved_super_admin_request(email),
            self.store.find_approved_member_request(email),
        );
        let candidate = pick_candidate(
            lookup_or_none(club_owner, "club owner request"),
            lookup_or_none(super_admin, "super admin request"),
            lookup_or_none(member, "member request"),
        );

        let resolved_club_id = match &candidate {
            Some(ApprovalCandidate::ClubOwner(request)) => {
                lookup_or_none(
                    self.store.find_club_id_by_name(&request.club_name).await,
                    "club by name",
                )
            }
            _ => None,
        };

        let user = synthesize_profile(identity, candidate.as_ref(), resolved_club_id, now_millis());
        self.store.create_user(&user).await?;
        tracing::info!(
            uid = %user.uid,
            role = %user.role,
            status = ?user.status,
            "Profile created on first sign-in"
        );
        Ok(user)
    }

    async fn recover_from_read_failure(
        &self,
        identity: &AuthIdentity,
        cause: AppError,
    ) -> AppResult<User> {
        tracing::warn!(uid = %identity.uid, error = %cause, "Profile read failed, checking session");
        match self.session.refresh_token(&identity.uid).await {
            Ok(()) => Ok(degraded_profile(identity, now_millis())),
            Err(refresh_err) => {
                tracing::warn!(uid = %identity.uid, error = %refresh_err, "Session refresh failed");
                if let Err(e) = self.session.sign_out(&identity.uid).await {
                    tracing::error!(uid = %identity.uid, error = %e, "Sign-out after failed refresh also failed");
                }
                Err(AppError::session_expired())
            }
        }
    }

    /// Fill in a missing club id for club-scoped roles. Failures leave the
    /// profile as it was.
    async fn backfill_club_id(&self, mut user: User) -> User {
        if !user.role.is_club_role() || user.club_id.is_some() {
            return user;
        }
        let Some(club_name) = user.club_name.clone() else {
            return user;
        };

        let club_id = match self.store.find_club_id_by_name(&club_name).await {
            Ok(Some(id)) => id,
            Ok(None) => return user,
            Err(e) => {
                tracing::warn!(uid = %user.uid, club_name, error = %e, "Club lookup for backfill failed");
                return user;
            }
        };

        let now = now_millis();
        match self
            .store
            .update_user(&user.uid, json!({ "clubId": club_id, "updatedAt": now }))
            .await
        {
            Ok(()) => {
                tracing::debug!(uid = %user.uid, club_id, "Backfilled club id");
                user.club_id = Some(club_id);
                user.updated_at = now;
            }
            Err(e) => {
                tracing::warn!(uid = %user.uid, error = %e, "Failed to persist backfilled club id");
            }
        }
        user
    }

    /// Whether the resolved profile may use the application
    pub fn is_active(user: &User) -> bool {
        user.status == UserStatus::Active && !user.profile_error
    }
}

fn lookup_or_none<T>(result: AppResult<Option<T>>, what: &str) -> Option<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(lookup = what, error = %e, "Approval lookup failed, treating as absent");
        None
    })
}
