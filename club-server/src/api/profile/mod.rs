//! Profile bootstrap and sign-out API

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/profile/resolve", post(handler::resolve))
        .route("/api/auth/sign-out", post(handler::sign_out))
}
