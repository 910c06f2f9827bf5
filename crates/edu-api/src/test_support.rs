//! Shared helpers for handler tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::Router;
use edu_core::Role;
use edu_crypto::{PasswordCost, TokenConfig};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::auth_middleware;
use crate::identity::{self, Registration};
use crate::records::{DifficultyLevel, LearningModuleRecord};
use crate::state::{AppConfig, AppState};

/// In-memory state with a cheap password cost.
pub fn test_state() -> AppState {
    let config = AppConfig {
        port: 0,
        token: TokenConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
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

/// Mount a protected router behind the auth middleware on fresh state.
pub fn caller_app(router: Router<AppState>) -> (Router, AppState) {
    let state = test_state();
    let app = router
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());
    (app, state)
}

/// Register a fresh account with `role` and return its bearer token.
pub async fn seed_caller(state: &AppState, role: Role) -> String {
    let session = identity::register(
        state,
        Registration {
            first_name: "Test".into(),
            last_name: role.as_str().into(),
            email: format!("{}-{}@example.com", role.as_str(), Uuid::new_v4()),
            phone: None,
            password: "secret1".into(),
            role: role.as_str().into(),
        },
    )
    .await
    .unwrap();
    session.token
}

/// Insert a catalogue module and return its id.
pub fn seed_module(state: &AppState) -> Uuid {
    let now = chrono::Utc::now();
    let module = LearningModuleRecord {
        id: Uuid::new_v4(),
        title: "Unit 1".into(),
        description: None,
        objectives: None,
        prerequisites: None,
        estimated_duration: 2.0,
        difficulty_level: DifficultyLevel::Beginner,
        created_at: now,
        updated_at: now,
    };
    state.modules.insert(module.id, module.clone());
    module.id
}

/// Send one request and decode the JSON response, or `Null` for an empty body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
