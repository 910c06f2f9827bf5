//! # Progress API
//!
//! A student's progress through a learning module, one record per
//! (student, module). Assessment scores are percentages.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use edu_core::Role;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, require_range, Validate};
use crate::routes::modules::require_module;
use crate::records::{ProgressRecord, ProgressStatus, SCORE_RANGE};
use crate::state::AppState;

pub(crate) const STAFF_ROLES: &[Role] = &[Role::Teacher, Role::Admin];
pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const DELETE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Progress record not found";

fn check_score(score: Option<f64>) -> Result<(), String> {
    match score {
        Some(s) => require_range(s, "assessment_score", SCORE_RANGE.0, SCORE_RANGE.1),
        None => Ok(()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProgressRequest {
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub start_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ProgressStatus,
    pub assessment_score: Option<f64>,
    pub assessment_date: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

impl Validate for CreateProgressRequest {
    fn validate(&self) -> Result<(), String> {
        check_score(self.assessment_score)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProgressRequest {
    pub completion_date: Option<DateTime<Utc>>,
    pub status: Option<ProgressStatus>,
    pub assessment_score: Option<f64>,
    pub assessment_date: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

impl Validate for UpdateProgressRequest {
    fn validate(&self) -> Result<(), String> {
        check_score(self.assessment_score)
    }
}

/// Build the progress router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/progress", get(list_progress).post(create_progress))
        .route("/api/progress/student/{student_id}", get(list_student_progress))
        .route("/api/progress/module/{module_id}", get(list_module_progress))
        .route(
            "/api/progress/{id}",
            get(get_progress).put(update_progress).delete(delete_progress),
        )
}

/// Completing a module stamps its completion date unless one was given.
fn stamp_completion(record: &mut ProgressRecord, now: DateTime<Utc>) {
    if record.status == ProgressStatus::Completed && record.completion_date.is_none() {
        record.completion_date = Some(now);
    }
}

/// GET /api/progress: List all progress records.
#[utoipa::path(
    get,
    path = "/api/progress",
    responses((status = 200, description = "Progress records", body = Vec<ProgressRecord>)),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn list_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<ProgressRecord>>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let mut records = state.progress.list();
    records.sort_by_key(|p| p.start_date);
    Ok(Json(records))
}

/// GET /api/progress/student/{student_id}: One student's progress.
#[utoipa::path(
    get,
    path = "/api/progress/student/{student_id}",
    params(("student_id" = Uuid, Path, description = "Student ID")),
    responses((status = 200, description = "Progress records", body = Vec<ProgressRecord>)),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn list_student_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
    student_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<ProgressRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let student_id = extract_path(student_id)?;
    Ok(Json(state.progress.filter(|p| p.student_id == student_id)))
}

/// GET /api/progress/module/{module_id}: Progress of every student in a module.
#[utoipa::path(
    get,
    path = "/api/progress/module/{module_id}",
    params(("module_id" = Uuid, Path, description = "Learning module ID")),
    responses((status = 200, description = "Progress records", body = Vec<ProgressRecord>)),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn list_module_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
    module_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<ProgressRecord>>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let module_id = extract_path(module_id)?;
    Ok(Json(state.progress.filter(|p| p.module_id == module_id)))
}

/// POST /api/progress: Start tracking a student in a module.
#[utoipa::path(
    post,
    path = "/api/progress",
    request_body = CreateProgressRequest,
    responses(
        (status = 201, description = "Progress record created", body = ProgressRecord),
        (status = 400, description = "Invalid score or duplicate record", body = crate::error::ErrorBody),
        (status = 404, description = "Student not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn create_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateProgressRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProgressRecord>), AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let req = extract_validated_json(body)?;
    if !state.students.contains(&req.student_id) {
        return Err(AppError::NotFound("Student not found".into()));
    }
    require_module(&state, Some(req.module_id))?;

    let now = Utc::now();
    let mut record = ProgressRecord {
        id: Uuid::new_v4(),
        student_id: req.student_id,
        module_id: req.module_id,
        start_date: req.start_date.unwrap_or(now),
        completion_date: req.completion_date,
        status: req.status,
        assessment_date: req
            .assessment_date
            .or(req.assessment_score.map(|_| now)),
        assessment_score: req.assessment_score,
        feedback: req.feedback,
        created_at: now,
        updated_at: now,
    };
    stamp_completion(&mut record, now);
    state
        .progress
        .insert_unique(record.id, record.clone(), |p| (p.student_id, p.module_id))
        .map_err(|_| {
            AppError::AlreadyExists(
                "Progress record already exists for this student and module".into(),
            )
        })?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/progress/{id}: Get one progress record.
#[utoipa::path(
    get,
    path = "/api/progress/{id}",
    params(("id" = Uuid, Path, description = "Progress record ID")),
    responses(
        (status = 200, description = "Progress record", body = ProgressRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn get_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProgressRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    state
        .progress
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// PUT /api/progress/{id}: Update a progress record.
#[utoipa::path(
    put,
    path = "/api/progress/{id}",
    params(("id" = Uuid, Path, description = "Progress record ID")),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "Progress updated", body = ProgressRecord),
        (status = 400, description = "Invalid score", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn update_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateProgressRequest>, JsonRejection>,
) -> Result<Json<ProgressRecord>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    state
        .progress
        .update(&id, |p| {
            if req.completion_date.is_some() {
                p.completion_date = req.completion_date;
            }
            if let Some(v) = req.status {
                p.status = v;
            }
            if let Some(score) = req.assessment_score {
                p.assessment_score = Some(score);
                p.assessment_date = Some(req.assessment_date.unwrap_or(now));
            } else if req.assessment_date.is_some() {
                p.assessment_date = req.assessment_date;
            }
            if req.feedback.is_some() {
                p.feedback = req.feedback;
            }
            stamp_completion(p, now);
            p.updated_at = now;
        })
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// DELETE /api/progress/{id}: Delete a progress record.
#[utoipa::path(
    delete,
    path = "/api/progress/{id}",
    params(("id" = Uuid, Path, description = "Progress record ID")),
    responses(
        (status = 204, description = "Progress record deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "progress"
)]
pub async fn delete_progress(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, DELETE_ROLES)?;
    let id = extract_path(id)?;
    state
        .progress
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    Ok(StatusCode::NO_CONTENT)
}
