//! Approval API

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/admin/approvals", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/adult", post(handler::approve_adult))
        .route("/family", post(handler::approve_family))
        .route("/member", post(handler::approve_member))
        .route("/reject", post(handler::reject))
}
