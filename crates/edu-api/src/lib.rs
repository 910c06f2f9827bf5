//! # edu-api: Axum API Services for the Education Backend
//!
//! Resolves who is calling (password login issues a signed token, every
//! protected request presents it) and gates each route on the caller's role,
//! plus ownership for assignments and their submissions.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                    | Access                     |
//! |------------------------|---------------------------|----------------------------|
//! | `/api/auth/register`   | [`routes::auth`]          | Public                     |
//! | `/api/auth/login`      | [`routes::auth`]          | Public                     |
//! | `/api/auth/*`          | [`routes::auth`]          | Any authenticated role     |
//! | `/api/students/*`      | [`routes::students`]      | Per-route role sets        |
//! | `/api/teachers/*`      | [`routes::teachers`]      | Per-route role sets        |
//! | `/api/groups/*`        | [`routes::groups`]        | Per-route role sets        |
//! | `/api/modules/*`       | [`routes::modules`]       | Per-route role sets        |
//! | `/api/lessons/*`       | [`routes::lessons`]       | Per-route role sets        |
//! | `/api/assignments/*`   | [`routes::assignments`]   | Role sets plus ownership   |
//! | `/api/attendance/*`    | [`routes::attendance`]    | Per-route role sets        |
//! | `/api/progress/*`      | [`routes::progress`]      | Per-route role sets        |
//! | `/openapi.json`        | [`openapi`]               | Public                     |
//! | `/health/*`            | this module               | Public                     |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → auth_middleware (protected routes only) → Handler
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod openapi;
pub mod records;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Registration, login, the OpenAPI document and the health probes are
/// mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::auth::router())
        .merge(routes::students::router())
        .merge(routes::teachers::router())
        .merge(routes::groups::router())
        .merge(routes::modules::router())
        .merge(routes::lessons::router())
        .merge(routes::assignments::router())
        .merge(routes::attendance::router())
        .merge(routes::progress::router())
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    let public = Router::new()
        .merge(routes::auth::public_router())
        .merge(openapi::router())
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe. Always 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Checks the database when one is configured.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
