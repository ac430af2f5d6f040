//! Registration submission API

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/registrations/adult", post(handler::submit_adult))
        .route("/api/registrations/family", post(handler::submit_family))
}
