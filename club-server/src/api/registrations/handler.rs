use axum::{Json, extract::State};
use serde::Serialize;
use shared::{ApiResponse, AppResult};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::registration::{AdultRegistrationSubmission, FamilyRegistrationSubmission};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub request_id: String,
}

/// POST /api/registrations/adult
pub async fn submit_adult(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(form): Json<AdultRegistrationSubmission>,
) -> AppResult<ApiResponse<Submitted>> {
    let request_id = state.registrations.submit_adult(&user.caller(), form).await?;
    Ok(ApiResponse::success(Submitted { request_id }))
}

/// POST /api/registrations/family
pub async fn submit_family(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(form): Json<FamilyRegistrationSubmission>,
) -> AppResult<ApiResponse<Submitted>> {
    let request_id = state.registrations.submit_family(&user.caller(), form).await?;
    Ok(ApiResponse::success(Submitted { request_id }))
}
