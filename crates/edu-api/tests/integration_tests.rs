//! # Integration Tests for edu-api
//!
//! Drives the fully assembled application: health probes, the register and
//! login flow, token failures on `/api/auth/me`, per-route role sets,
//! assignment ownership and the OpenAPI document.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use edu_core::UserId;
use edu_crypto::{PasswordCost, TokenConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use edu_api::state::{AppConfig, AppState};

/// Helper: in-memory state with a cheap password cost.
fn test_state() -> AppState {
    let config = AppConfig {
        port: 0,
        token: TokenConfig {
            secret: "integration-test-secret-0123456789".into(),
            ttl_secs: 3600,
            leeway_secs: 0,
        },
        password_cost: PasswordCost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
        database_url: None,
        log_json: false,
    };
    AppState::try_with_config(config, None).unwrap()
}

/// Helper: build the test app on fresh state.
fn test_app() -> (axum::Router, AppState) {
    let state = test_state();
    (edu_api::app(state.clone()), state)
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: send a request with an optional token and JSON body.
async fn call(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_string(response).await;
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

/// Helper: register an account and return `(token, user_id)`.
async fn register(app: &axum::Router, email: &str, role: &str) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "firstName": "A",
            "lastName": "B",
            "email": email,
            "password": "secret1",
            "role": role
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {email}: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe_without_database() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Register / Login Flow ----------------------------------------------------

#[tokio::test]
async fn test_register_login_me_scenario() {
    let (app, _) = test_app();
    let registration = json!({
        "email": "a@x.com",
        "password": "secret1",
        "role": "student",
        "firstName": "A",
        "lastName": "B"
    });

    let (status, body) = call(&app, "POST", "/api/auth/register", None, Some(registration.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "student");
    assert!(body["token"].is_string());

    let (status, body) = call(&app, "POST", "/api/auth/register", None, Some(registration)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "User already exists");

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "a@x.com", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid credentials");
    assert!(body.get("token").is_none());

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "a@x.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
    assert_eq!(me["role"], "student");
    assert_eq!(me["profile"]["first_name"], "A");
}

#[tokio::test]
async fn test_duplicate_email_ignores_case_and_whitespace() {
    let (app, _) = test_app();
    register(&app, "dup@x.com", "teacher").await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "firstName": "C",
            "lastName": "D",
            "email": "  DUP@X.com ",
            "password": "secret1",
            "role": "student"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "User already exists");
}

#[tokio::test]
async fn test_unknown_role_is_rejected() {
    let (app, _) = test_app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "firstName": "A",
            "lastName": "B",
            "email": "r@x.com",
            "password": "secret1",
            "role": "principal"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid role");
}

// -- Token Failures -----------------------------------------------------------

#[tokio::test]
async fn test_me_without_token_is_unauthenticated() {
    let (app, _) = test_app();
    let (status, body) = call(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("profile").is_none());
}

#[tokio::test]
async fn test_me_with_tampered_token_is_unauthenticated() {
    let (app, _) = test_app();
    let (token, _) = register(&app, "t@x.com", "student").await;
    let mut chars: Vec<char> = token.chars().collect();
    let i = chars.len() - 10;
    chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&tampered), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn test_me_with_expired_token_is_unauthenticated() {
    let (app, state) = test_app();
    let (_, user_id) = register(&app, "e@x.com", "teacher").await;
    let user_id: UserId = user_id.parse().unwrap();
    let expired = state
        .tokens
        .issue_at(user_id, Utc::now() - Duration::hours(2))
        .unwrap();

    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("profile").is_none());
}

#[tokio::test]
async fn test_token_from_another_key_is_unauthenticated() {
    let (app, _) = test_app();
    let (other_app, _) = test_app();
    let (token, _) = register(&other_app, "k@x.com", "student").await;
    let (status, _) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// -- Role Gate ----------------------------------------------------------------

#[tokio::test]
async fn test_admin_only_routes_reject_teacher_regardless_of_existence() {
    let (app, _) = test_app();
    let (teacher, _) = register(&app, "teach@x.com", "teacher").await;
    let missing = Uuid::new_v4();

    let admin_only: Vec<(&str, String, Option<Value>)> = vec![
        ("POST", "/api/students".into(), Some(json!({"first_name": "S", "last_name": "T", "email": "s@x.com"}))),
        ("PUT", format!("/api/students/{missing}"), Some(json!({"first_name": "S"}))),
        ("DELETE", format!("/api/students/{missing}"), None),
        ("POST", "/api/teachers".into(), Some(json!({"first_name": "S", "last_name": "T", "email": "t2@x.com"}))),
        ("DELETE", format!("/api/teachers/{missing}"), None),
        ("POST", "/api/groups".into(), Some(json!({"name": "G", "start_date": "2025-01-01"}))),
        ("DELETE", format!("/api/groups/{missing}"), None),
        ("DELETE", format!("/api/lessons/{missing}"), None),
        ("DELETE", format!("/api/attendance/{missing}"), None),
        ("DELETE", format!("/api/progress/{missing}"), None),
    ];

    for (method, uri, body) in admin_only {
        let (status, err) = call(&app, method, &uri, Some(&teacher), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(err["error"]["message"], "Not authorized to perform this action");
    }
}

#[tokio::test]
async fn test_malformed_ids_are_gated_before_parsing() {
    let (app, _) = test_app();
    let (teacher, _) = register(&app, "gate@x.com", "teacher").await;
    let (admin, _) = register(&app, "boss@x.com", "admin").await;

    for uri in [
        "/api/students/not-a-uuid",
        "/api/teachers/not-a-uuid",
        "/api/groups/not-a-uuid/students/also-bad",
        "/api/progress/not-a-uuid",
    ] {
        let (status, err) = call(&app, "DELETE", uri, Some(&teacher), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "DELETE {uri}");
        assert_eq!(err["error"]["code"], "FORBIDDEN");
    }

    let (status, err) = call(&app, "DELETE", "/api/students/not-a-uuid", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "BAD_REQUEST");
    assert!(err["error"]["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn test_student_listing_is_staff_only() {
    let (app, _) = test_app();
    let (student, _) = register(&app, "stud@x.com", "student").await;
    let (teacher, _) = register(&app, "staff@x.com", "teacher").await;
    let (admin, _) = register(&app, "root@x.com", "admin").await;

    let (status, _) = call(&app, "GET", "/api/students", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, list) = call(&app, "GET", "/api/students", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (status, _) = call(&app, "GET", "/api/students", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_volunteer_is_admitted_nowhere_by_default() {
    let (app, _) = test_app();
    let (volunteer, _) = register(&app, "vol@x.com", "volunteer").await;
    for uri in ["/api/students", "/api/groups", "/api/lessons", "/api/assignments"] {
        let (status, _) = call(&app, "GET", uri, Some(&volunteer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
    let (status, me) = call(&app, "GET", "/api/auth/me", Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "volunteer");
}

// -- Ownership ----------------------------------------------------------------

#[tokio::test]
async fn test_assignment_delete_requires_owner_or_admin() {
    let (app, _) = test_app();
    let (owner, _) = register(&app, "owner@x.com", "teacher").await;
    let (other, _) = register(&app, "other@x.com", "teacher").await;
    let (admin, _) = register(&app, "admin@x.com", "admin").await;

    let (status, assignment) = call(
        &app,
        "POST",
        "/api/assignments",
        Some(&owner),
        Some(json!({"title": "Essay", "due_date": Utc::now() + Duration::days(3)})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(assignment["points_possible"], 100.0);
    let uri = format!("/api/assignments/{}", assignment["id"].as_str().unwrap());

    let (status, body) = call(&app, "DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Not authorized to delete this assignment");

    let (status, _) = call(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_password_then_login_with_new_password() {
    let (app, _) = test_app();
    let (token, _) = register(&app, "pw@x.com", "student").await;

    let (status, _) = call(
        &app,
        "PUT",
        "/api/auth/change-password",
        Some(&token),
        Some(json!({"currentPassword": "nope", "newPassword": "better1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        "PUT",
        "/api/auth/change-password",
        Some(&token),
        Some(json!({"currentPassword": "secret1", "newPassword": "better1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password updated successfully");

    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "pw@x.com", "password": "better1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_json_is_public() {
    let (app, _) = test_app();
    let (status, spec) = call(&app, "GET", "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/api/auth/me"].is_object());
    assert!(spec["components"]["securitySchemes"]["bearer"].is_object());
}
