use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::{ApiResponse, AppResult};

use crate::approval::{LinkResult, LinkStatus, guard};
use crate::auth::CurrentUser;
use crate::core::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBody {
    pub user_id: String,
    pub member_id: String,
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairQuery {
    pub user_id: String,
    pub member_id: String,
}

/// POST /api/admin/users/link-member
pub async fn link(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<LinkBody>,
) -> AppResult<ApiResponse<LinkResult>> {
    let result = state
        .approvals
        .link_user_to_member(&body.user_id, &body.member_id, &user.caller(), body.force_update)
        .await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/admin/users/unlink-member
pub async fn unlink(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<PairQuery>,
) -> AppResult<ApiResponse<LinkResult>> {
    let result = state
        .approvals
        .unlink_user_from_member(&body.user_id, &body.member_id, &user.caller())
        .await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/admin/users/link-status?userId=..&memberId=..
pub async fn status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<PairQuery>,
) -> AppResult<ApiResponse<LinkStatus>> {
    guard::require_approver(&user.caller())?;
    let status = state.approvals.link_status(&query.user_id, &query.member_id)?;
    Ok(ApiResponse::success(status))
}
