//! `CurrentUser` as an axum extractor
//!
//! A handler that takes [`CurrentUser`] only runs for a bearer token that
//! validates and was issued after the caller's last sign-out.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::{AppError, AppResult};

use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let Some(header) = parts.headers.get(http::header::AUTHORIZATION) else {
        security_log!("WARN", "auth_missing", uri = parts.uri.to_string());
        return Err(AppError::unauthorized());
    };
    header
        .to_str()
        .ok()
        .and_then(JwtService::extract_from_header)
        .ok_or_else(|| AppError::invalid_token("Expected `Authorization: Bearer <token>`"))
}

fn rejection(err: JwtError, parts: &Parts) -> AppError {
    security_log!(
        "WARN",
        "auth_failed",
        error = err.to_string(),
        uri = parts.uri.to_string()
    );
    match err {
        JwtError::Expired => AppError::token_expired(),
        _ => AppError::invalid_token("Token rejected"),
    }
}

impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &ServerState) -> AppResult<Self> {
        // Already resolved by an earlier extractor on this request
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let user: CurrentUser = state
            .jwt_service
            .validate_token(bearer_token(parts)?)
            .map_err(|e| rejection(e, parts))?
            .into();

        if !state.sessions.is_valid(&user.id, user.issued_at) {
            security_log!("WARN", "auth_revoked", uid = user.id.clone());
            return Err(AppError::session_expired());
        }
        state.sessions.record_token(&user.id, user.issued_at);

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
