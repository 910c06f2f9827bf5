//! # Students API
//!
//! Student profile CRUD. Profiles created here have no login of their own;
//! accounts that register as students get a profile through
//! `/api/auth/register` instead. Writes go through to Postgres when a pool
//! is configured.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use edu_core::{Email, Role};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, optional_text, require_text, Validate};
use crate::records::{StudentRecord, StudentStatus};
use crate::state::AppState;

pub(crate) const LIST_ROLES: &[Role] = &[Role::Teacher, Role::Admin];
pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const WRITE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Student not found";
const EMAIL_TAKEN: &str = "A student with this email already exists";

/// List filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    /// Case-insensitive substring of the first or last name.
    pub name: Option<String>,
    pub status: Option<StudentStatus>,
}

/// Create student request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStudentRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub enrollment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: StudentStatus,
    pub notes: Option<String>,
}

impl Validate for CreateStudentRequest {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.first_name, "first_name")?;
        require_text(&self.last_name, "last_name")?;
        require_text(&self.email, "email")
    }
}

/// Partial student update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateStudentRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub status: Option<StudentStatus>,
    pub notes: Option<String>,
}

impl Validate for UpdateStudentRequest {
    fn validate(&self) -> Result<(), String> {
        optional_text(self.first_name.as_deref(), "first_name")?;
        optional_text(self.last_name.as_deref(), "last_name")?;
        optional_text(self.email.as_deref(), "email")
    }
}

/// Build the students router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(create_student))
        .route(
            "/api/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
}

fn persistence_error(err: sqlx::Error) -> AppError {
    if crate::db::is_unique_violation(&err) {
        AppError::AlreadyExists(EMAIL_TAKEN.into())
    } else {
        tracing::error!(error = %err, "failed to persist student");
        AppError::Internal(format!("database error: {err}"))
    }
}

/// GET /api/students: List students.
#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Students", body = Vec<StudentRecord>),
        (status = 403, description = "Role not permitted", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn list_students(
    State(state): State<AppState>,
    Caller(caller): Caller,
    query: Result<Query<StudentQuery>, QueryRejection>,
) -> Result<Json<Vec<StudentRecord>>, AppError> {
    require_roles(&caller, LIST_ROLES)?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let needle = query
        .name
        .as_deref()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty());
    let mut students = state.students.filter(|s| {
        let name_matches = needle.as_deref().map_or(true, |n| {
            s.first_name.to_lowercase().contains(n) || s.last_name.to_lowercase().contains(n)
        });
        let status_matches = query.status.map_or(true, |status| s.status == status);
        name_matches && status_matches
    });
    students.sort_by(|a, b| {
        (&a.last_name, &a.first_name, a.created_at).cmp(&(&b.last_name, &b.first_name, b.created_at))
    });
    Ok(Json(students))
}

/// POST /api/students: Create a student profile.
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Student created", body = StudentRecord),
        (status = 400, description = "Invalid fields or email already used", body = crate::error::ErrorBody),
        (status = 403, description = "Role not permitted", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn create_student(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateStudentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StudentRecord>), AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let req = extract_validated_json(body)?;
    let email = Email::parse(&req.email)?;
    let now = Utc::now();

    let record = StudentRecord {
        id: Uuid::new_v4(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        email,
        phone: req.phone,
        address: req.address,
        date_of_birth: req.date_of_birth,
        enrollment_date: req.enrollment_date.unwrap_or(now),
        status: req.status,
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };

    state
        .students
        .insert_unique(record.id, record.clone(), |s| s.email.clone())
        .map_err(|_| AppError::AlreadyExists(EMAIL_TAKEN.into()))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::profiles::upsert_student(pool, &record).await {
            state.students.remove(&record.id);
            return Err(persistence_error(e));
        }
    }

    tracing::info!(student_id = %record.id, by = %caller.user_id, "student created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/students/{id}: Get one student.
#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student found", body = StudentRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn get_student(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StudentRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    state
        .students
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// PUT /api/students/{id}: Update a student.
#[utoipa::path(
    put,
    path = "/api/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    request_body = UpdateStudentRequest,
    responses(
        (status = 200, description = "Student updated", body = StudentRecord),
        (status = 400, description = "Invalid fields or email already used", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn update_student(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateStudentRequest>, JsonRejection>,
) -> Result<Json<StudentRecord>, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let email = req.email.as_deref().map(Email::parse).transpose()?;
    let now = Utc::now();

    let previous = state
        .students
        .get(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

    let updated = state
        .students
        .update_unique(
            &id,
            |s| s.email.clone(),
            |s| {
                if let Some(v) = req.first_name {
                    s.first_name = v.trim().to_string();
                }
                if let Some(v) = req.last_name {
                    s.last_name = v.trim().to_string();
                }
                if let Some(v) = email {
                    s.email = v;
                }
                if req.phone.is_some() {
                    s.phone = req.phone;
                }
                if req.address.is_some() {
                    s.address = req.address;
                }
                if req.date_of_birth.is_some() {
                    s.date_of_birth = req.date_of_birth;
                }
                if let Some(v) = req.enrollment_date {
                    s.enrollment_date = v;
                }
                if let Some(v) = req.status {
                    s.status = v;
                }
                if req.notes.is_some() {
                    s.notes = req.notes;
                }
                s.updated_at = now;
            },
        )
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?
        .map_err(|_| AppError::AlreadyExists(EMAIL_TAKEN.into()))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::profiles::upsert_student(pool, &updated).await {
            state.students.insert(id, previous);
            return Err(persistence_error(e));
        }
    }

    Ok(Json(updated))
}

/// DELETE /api/students/{id}: Delete a student profile.
#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "students"
)]
pub async fn delete_student(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let removed = state
        .students
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::profiles::delete_student(pool, id).await {
            state.students.insert(id, removed);
            tracing::error!(student_id = %id, error = %e, "failed to delete student");
            return Err(AppError::Internal(format!("database error: {e}")));
        }
    }

    tracing::info!(student_id = %id, by = %caller.user_id, "student deleted");
    Ok(StatusCode::NO_CONTENT)
}
