use axum::{Json, extract::State};
use serde::Deserialize;
use shared::models::RequestType;
use shared::{ApiResponse, AppResult};

use crate::approval::{AdultApproval, FamilyApproval, RejectResult};
use crate::auth::CurrentUser;
use crate::core::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    pub request_id: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/admin/approvals/adult
pub async fn approve_adult(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<ApproveBody>,
) -> AppResult<ApiResponse<AdultApproval>> {
    let result = state
        .approvals
        .approve_adult(&body.request_id, &user.caller())
        .await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/approvals/family
pub async fn approve_family(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<ApproveBody>,
) -> AppResult<ApiResponse<FamilyApproval>> {
    let result = state
        .approvals
        .approve_family(&body.request_id, &user.caller())
        .await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/approvals/member
pub async fn approve_member(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<ApproveBody>,
) -> AppResult<ApiResponse<AdultApproval>> {
    let result = state
        .approvals
        .approve_member(&body.request_id, &user.caller())
        .await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/approvals/reject
pub async fn reject(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<RejectBody>,
) -> AppResult<ApiResponse<RejectResult>> {
    let reason = body.reason.filter(|r| !r.trim().is_empty());
    let result = state
        .approvals
        .reject(&body.request_id, body.request_type, &user.caller(), reason)
        .await?;
    Ok(ApiResponse::success(result))
}
