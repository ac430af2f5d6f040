use axum::extract::State;
use serde::Serialize;
use shared::models::User;
use shared::{ApiResponse, AppError, AppResult};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::profile::SessionControl;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProfile {
    pub profile: User,
    /// Fresh token carrying the resolved role and club; absent for a
    /// degraded profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// POST /api/profile/resolve
pub async fn resolve(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<ResolvedProfile>> {
    let profile = state.profiles.resolve_or_create_profile(&user.identity()).await?;
    let token = if profile.profile_error {
        None
    } else {
        Some(
            state
                .jwt_service
                .generate_token(&profile)
                .map_err(|e| AppError::internal(e.to_string()))?,
        )
    };
    Ok(ApiResponse::success(ResolvedProfile { profile, token }))
}

/// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.sessions.sign_out(&user.id).await?;
    state.profiles.cache().invalidate(&user.id);
    Ok(ApiResponse::ok())
}
