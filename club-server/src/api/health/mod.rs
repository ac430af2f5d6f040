//! Health check

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Last committed store sequence, absent when the store is unreadable
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<u64>,
    listeners: usize,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let sequence = match state.store.sequence() {
        Ok(seq) => Some(seq),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read the store");
            None
        }
    };
    Json(HealthResponse {
        status: if sequence.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        sequence,
        listeners: state.store.listener_count(),
    })
}
