//! HTTP API
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/health | GET | none |
//! | /api/registrations/adult | POST | user |
//! | /api/registrations/family | POST | user |
//! | /api/profile/resolve | POST | user |
//! | /api/auth/sign-out | POST | user |
//! | /api/admin/approvals/{adult,family,member} | POST | staff |
//! | /api/admin/approvals/reject | POST | staff |
//! | /api/admin/users/link-member | POST | staff |
//! | /api/admin/users/unlink-member | POST | staff |
//! | /api/admin/users/link-status | GET | staff |

pub mod approvals;
pub mod health;
pub mod profile;
pub mod registrations;
pub mod users;

use axum::Router;
use http::{HeaderName, HeaderValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// All routes, without middleware or state
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(registrations::router())
        .merge(profile::router())
        .merge(approvals::router())
        .merge(users::router())
}

/// Routes with middleware and state applied
pub fn build_app(state: &ServerState) -> Router {
    build_router()
        .with_state(state.clone())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
}
