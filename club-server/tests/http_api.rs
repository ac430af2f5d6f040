//! HTTP surface driven through `tower::ServiceExt::oneshot`

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use club_server::auth::{JwtConfig, generate_dev_secret};
use club_server::{Config, ServerState, api};
use common::*;
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use shared::models::{User, UserRole, UserStatus, collections};
use tower::ServiceExt;

fn app() -> (Router, ServerState) {
    let mut config = Config::with_overrides(std::env::temp_dir().to_string_lossy(), 0);
    config.jwt = JwtConfig {
        secret: generate_dev_secret(),
        expiration_minutes: 10,
        issuer: "club-server".into(),
        audience: "club-clients".into(),
    };
    let state = ServerState::with_store(config, store());
    (api::build_app(&state), state)
}

fn token_for(state: &ServerState, uid: &str, role: UserRole, club_id: Option<&str>) -> String {
    let mut profile: User = user(uid, UserStatus::Active);
    profile.role = role;
    profile.club_id = club_id.map(str::to_string);
    state.jwt_service.generate_token(&profile).unwrap()
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = if method == "GET" {
        Body::empty()
    } else {
        Body::from(body.to_string())
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/api/health", None, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_approval_endpoints_require_a_token() {
    let (app, _) = app();
    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/approvals/adult",
        None,
        json!({ "requestId": "r1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/approvals/adult",
        Some("not-a-jwt"),
        json!({ "requestId": "r1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submit_then_approve_over_http() {
    let (app, state) = app();
    seed_user(&state.store, "u1", UserStatus::Pending);
    let applicant_token = token_for(&state, "u1", UserRole::Member, None);
    let staff_token = token_for(&state, "staff-1", UserRole::ClubOwner, Some("c1"));
    let other_staff = token_for(&state, "staff-2", UserRole::ClubOwner, Some("c2"));

    let (status, body) = call(
        &app,
        "POST",
        "/api/registrations/adult",
        Some(&applicant_token),
        json!({ "clubId": "c1", "clubName": "Harbor", "name": "Kim", "phoneNumber": "010" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["data"]["requestId"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/approvals/adult",
        Some(&applicant_token),
        json!({ "requestId": request_id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/approvals/adult",
        Some(&other_staff),
        json!({ "requestId": request_id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        "POST",
        "/api/admin/approvals/adult",
        Some(&staff_token),
        json!({ "requestId": request_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["userId"], "u1");
    let member_id = body["data"]["memberId"].as_str().unwrap().to_string();
    assert_eq!(get_member(&state.store, &member_id).club_id, "c1");

    let (status, body) = call(
        &app,
        "POST",
        "/api/admin/approvals/adult",
        Some(&staff_token),
        json!({ "requestId": request_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 3002);
    assert_eq!(state.store.count(collections::MEMBERS).unwrap(), 1);

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/approvals/reject",
        Some(&staff_token),
        json!({ "requestId": request_id, "requestType": "adult" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_link_and_unlink_over_http() {
    let (app, state) = app();
    seed_user(&state.store, "u1", UserStatus::Active);
    seed_user(&state.store, "u2", UserStatus::Active);
    seed_member(&state.store, "m1", "c1");
    let admin_token = token_for(&state, "admin-1", UserRole::SuperAdmin, None);

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/users/link-member",
        Some(&admin_token),
        json!({ "userId": "u1", "memberId": "m1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "POST",
        "/api/admin/users/link-member",
        Some(&admin_token),
        json!({ "userId": "u2", "memberId": "m1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["userId"], "u1");

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/users/link-member",
        Some(&admin_token),
        json!({ "userId": "u2", "memberId": "m1", "forceUpdate": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "GET",
        "/api/admin/users/link-status?userId=u2&memberId=m1",
        Some(&admin_token),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLinked"], true);

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/users/unlink-member",
        Some(&admin_token),
        json!({ "userId": "u2", "memberId": "m1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(get_member(&state.store, "m1").user_id, None);
}

#[tokio::test]
async fn test_profile_resolve_then_sign_out() {
    let (app, state) = app();
    let token = token_for(&state, "newbie", UserRole::Member, None);

    let (status, body) = call(&app, "POST", "/api/profile/resolve", Some(&token), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["profile"]["status"], "pending");
    assert!(body["data"]["token"].is_string());
    assert!(state.store.get(collections::USERS, "newbie").unwrap().is_some());

    let (status, _) = call(&app, "POST", "/api/auth/sign-out", Some(&token), Value::Null).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "POST", "/api/profile/resolve", Some(&token), Value::Null).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1005);
}
