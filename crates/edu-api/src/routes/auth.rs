//! # Authentication API
//!
//! `register` and `login` are public and return a bearer token. `me` and
//! `change-password` sit behind the auth middleware like every resource
//! route. Bodies on these routes are camelCase.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use edu_core::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::identity::{self, Registration, ResolvedIdentity, RoleProfile, Session};
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    /// One of `student`, `teacher`, `volunteer`, `admin`.
    pub role: String,
}

/// Login request.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password change request.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The account summary returned with a token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
}

/// Register/login response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserSummary,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            user: UserSummary {
                id: *session.principal.user_id.as_uuid(),
                email: session.email.to_string(),
                role: session.principal.role,
            },
        }
    }
}

/// `GET /api/auth/me` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
    /// The caller's role profile; `null` for admins or when the profile
    /// record is missing.
    #[schema(value_type = Option<Object>)]
    pub profile: Option<RoleProfile>,
}

/// Plain confirmation message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

/// Routes that require a resolved identity.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", put(change_password))
}

/// POST /api/auth/register: Create an account and its role profile.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Duplicate email, invalid role or invalid field", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let req = extract_json(body)?;
    let session = identity::register(
        &state,
        Registration {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            password: req.password,
            role: req.role,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// POST /api/auth/login: Exchange email and password for a token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    let req = extract_json(body)?;
    let session = identity::login(&state, &req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// GET /api/auth/me: The caller's account and profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(resolved: ResolvedIdentity) -> Json<MeResponse> {
    let profile = match resolved.profile {
        Some(RoleProfile::Admin) => None,
        other => other,
    };
    Json(MeResponse {
        id: *resolved.principal.user_id.as_uuid(),
        email: resolved.email.to_string(),
        role: resolved.principal.role,
        profile,
    })
}

/// PUT /api/auth/change-password: Replace the caller's password.
#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "New password invalid", body = crate::error::ErrorBody),
        (status = 401, description = "Current password is incorrect", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    Caller(principal): Caller,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_json(body)?;
    identity::change_password(&state, &principal, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully".into(),
    }))
}
