//! User ↔ member link API

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/admin/users", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/link-member", post(handler::link))
        .route("/unlink-member", post(handler::unlink))
        .route("/link-status", get(handler::status))
}
