//! # Teachers API
//!
//! Teacher profile CRUD. Students may browse teachers; only admins change
//! them.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use edu_core::{Email, Role};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, optional_text, require_text, Validate};
use crate::records::{StaffStatus, TeacherRecord};
use crate::state::AppState;

pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const WRITE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Teacher not found";
const EMAIL_TAKEN: &str = "A teacher with this email already exists";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTeacherRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: StaffStatus,
    pub notes: Option<String>,
}

impl Validate for CreateTeacherRequest {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.first_name, "first_name")?;
        require_text(&self.last_name, "last_name")?;
        require_text(&self.email, "email")
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTeacherRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
    pub status: Option<StaffStatus>,
    pub notes: Option<String>,
}

impl Validate for UpdateTeacherRequest {
    fn validate(&self) -> Result<(), String> {
        optional_text(self.first_name.as_deref(), "first_name")?;
        optional_text(self.last_name.as_deref(), "last_name")?;
        optional_text(self.email.as_deref(), "email")
    }
}

/// Build the teachers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/teachers", get(list_teachers).post(create_teacher))
        .route(
            "/api/teachers/{id}",
            get(get_teacher).put(update_teacher).delete(delete_teacher),
        )
}

fn persistence_error(err: sqlx::Error) -> AppError {
    if crate::db::is_unique_violation(&err) {
        AppError::AlreadyExists(EMAIL_TAKEN.into())
    } else {
        tracing::error!(error = %err, "failed to persist teacher");
        AppError::Internal(format!("database error: {err}"))
    }
}

/// GET /api/teachers: List teachers.
#[utoipa::path(
    get,
    path = "/api/teachers",
    responses(
        (status = 200, description = "Teachers", body = Vec<TeacherRecord>),
    ),
    security(("bearer" = [])),
    tag = "teachers"
)]
pub async fn list_teachers(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<TeacherRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let mut teachers = state.teachers.list();
    teachers.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
    Ok(Json(teachers))
}

/// POST /api/teachers: Create a teacher profile.
#[utoipa::path(
    post,
    path = "/api/teachers",
    request_body = CreateTeacherRequest,
    responses(
        (status = 201, description = "Teacher created", body = TeacherRecord),
        (status = 400, description = "Invalid fields or email already used", body = crate::error::ErrorBody),
        (status = 403, description = "Role not permitted", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "teachers"
)]
pub async fn create_teacher(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateTeacherRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeacherRecord>), AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let req = extract_validated_json(body)?;
    let email = Email::parse(&req.email)?;
    let now = Utc::now();

    let record = TeacherRecord {
        id: Uuid::new_v4(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        email,
        phone: req.phone,
        specialization: req.specialization,
        hire_date: req.hire_date.unwrap_or(now),
        status: req.status,
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };

    state
        .teachers
        .insert_unique(record.id, record.clone(), |t| t.email.clone())
        .map_err(|_| AppError::AlreadyExists(EMAIL_TAKEN.into()))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::profiles::upsert_teacher(pool, &record).await {
            state.teachers.remove(&record.id);
            return Err(persistence_error(e));
        }
    }

    tracing::info!(teacher_id = %record.id, by = %caller.user_id, "teacher created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/teachers/{id}: Get one teacher.
#[utoipa::path(
    get,
    path = "/api/teachers/{id}",
    params(("id" = Uuid, Path, description = "Teacher ID")),
    responses(
        (status = 200, description = "Teacher found", body = TeacherRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "teachers"
)]
pub async fn get_teacher(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TeacherRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    state
        .teachers
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// PUT /api/teachers/{id}: Update a teacher.
#[utoipa::path(
    put,
    path = "/api/teachers/{id}",
    params(("id" = Uuid, Path, description = "Teacher ID")),
    request_body = UpdateTeacherRequest,
    responses(
        (status = 200, description = "Teacher updated", body = TeacherRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "teachers"
)]
pub async fn update_teacher(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateTeacherRequest>, JsonRejection>,
) -> Result<Json<TeacherRecord>, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let email = req.email.as_deref().map(Email::parse).transpose()?;
    let now = Utc::now();

    let previous = state
        .teachers
        .get(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

    let updated = state
        .teachers
        .update_unique(
            &id,
            |t| t.email.clone(),
            |t| {
                if let Some(v) = req.first_name {
                    t.first_name = v.trim().to_string();
                }
                if let Some(v) = req.last_name {
                    t.last_name = v.trim().to_string();
                }
                if let Some(v) = email {
                    t.email = v;
                }
                if req.phone.is_some() {
                    t.phone = req.phone;
                }
                if req.specialization.is_some() {
                    t.specialization = req.specialization;
                }
                if let Some(v) = req.hire_date {
                    t.hire_date = v;
                }
                if let Some(v) = req.status {
                    t.status = v;
                }
                if req.notes.is_some() {
                    t.notes = req.notes;
                }
                t.updated_at = now;
            },
        )
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?
        .map_err(|_| AppError::AlreadyExists(EMAIL_TAKEN.into()))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::profiles::upsert_teacher(pool, &updated).await {
            state.teachers.insert(id, previous);
            return Err(persistence_error(e));
        }
    }

    Ok(Json(updated))
}

/// DELETE /api/teachers/{id}: Delete a teacher profile.
#[utoipa::path(
    delete,
    path = "/api/teachers/{id}",
    params(("id" = Uuid, Path, description = "Teacher ID")),
    responses(
        (status = 204, description = "Teacher deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "teachers"
)]
pub async fn delete_teacher(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let removed = state
        .teachers
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::profiles::delete_teacher(pool, id).await {
            state.teachers.insert(id, removed);
            tracing::error!(teacher_id = %id, error = %e, "failed to delete teacher");
            return Err(AppError::Internal(format!("database error: {e}")));
        }
    }

    tracing::info!(teacher_id = %id, by = %caller.user_id, "teacher deleted");
    Ok(StatusCode::NO_CONTENT)
}
