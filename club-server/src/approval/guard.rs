//! Authorization and state guards shared by every protocol mutation

use shared::models::{CallerIdentity, RequestStatus, RequestType};
use shared::{AppError, AppResult, ErrorCode};

/// Caller must be an administrator or club staff at all
pub fn require_approver(caller: &CallerIdentity) -> AppResult<()> {
    if caller.is_admin() || caller.is_club_staff() {
        return Ok(());
    }
    Err(AppError::with_message(
        ErrorCode::ClubStaffRequired,
        "Only administrators or club staff can perform this action",
    )
    .with_detail("role", caller.role.as_str()))
}

/// Administrators act on any club; club staff only on their own
pub fn authorize_club(caller: &CallerIdentity, target_club_id: &str) -> AppResult<()> {
    require_approver(caller)?;
    if caller.is_admin() {
        return Ok(());
    }
    match caller.club_id.as_deref() {
        Some(club_id) if club_id == target_club_id => Ok(()),
        _ => Err(AppError::with_message(
            ErrorCode::ClubScopeViolation,
            "Cannot act on a different club",
        )
        .with_detail("clubId", target_club_id)),
    }
}

pub fn ensure_pending(status: RequestStatus) -> AppResult<()> {
    if status.is_terminal() {
        return Err(AppError::with_message(
            ErrorCode::RequestNotPending,
            format!("Request is already {status}"),
        )
        .with_detail("status", status.as_str()));
    }
    Ok(())
}

pub fn request_not_found(kind: RequestType, request_id: &str) -> AppError {
    AppError::with_message(
        ErrorCode::RequestNotFound,
        format!("{} registration request not found", kind.as_str()),
    )
    .with_detail("requestId", request_id)
}
