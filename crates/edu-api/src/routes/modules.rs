//! # Learning Modules API
//!
//! The module catalogue that lessons, assignments and progress rows point
//! at through `module_id`. Everyone with a role profile can read it; only
//! admins curate it.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use edu_core::Role;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, optional_text, require_text, Validate};
use crate::records::{DifficultyLevel, LearningModuleRecord, DEFAULT_ESTIMATED_DURATION};
use crate::state::AppState;

pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const WRITE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Learning module not found";

fn check_duration(value: Option<f64>) -> Result<(), String> {
    match value {
        Some(hours) if !hours.is_finite() || hours <= 0.0 => {
            Err("estimated_duration must be greater than 0".into())
        }
        _ => Ok(()),
    }
}

/// 404 unless `module_id` is absent or names a catalogued module.
pub(crate) fn require_module(state: &AppState, module_id: Option<Uuid>) -> Result<(), AppError> {
    match module_id {
        Some(id) if !state.modules.contains(&id) => Err(AppError::NotFound(NOT_FOUND.into())),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateModuleRequest {
    pub title: String,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub prerequisites: Option<String>,
    /// Hours; defaults to 1.
    pub estimated_duration: Option<f64>,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
}

impl Validate for CreateModuleRequest {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.title, "title")?;
        check_duration(self.estimated_duration)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateModuleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub prerequisites: Option<String>,
    pub estimated_duration: Option<f64>,
    pub difficulty_level: Option<DifficultyLevel>,
}

impl Validate for UpdateModuleRequest {
    fn validate(&self) -> Result<(), String> {
        optional_text(self.title.as_deref(), "title")?;
        check_duration(self.estimated_duration)
    }
}

/// Build the learning-modules router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/modules", get(list_modules).post(create_module))
        .route(
            "/api/modules/{id}",
            get(get_module).put(update_module).delete(delete_module),
        )
}

/// GET /api/modules: List learning modules by title.
#[utoipa::path(
    get,
    path = "/api/modules",
    responses((status = 200, description = "Learning modules", body = Vec<LearningModuleRecord>)),
    security(("bearer" = [])),
    tag = "modules"
)]
pub async fn list_modules(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<LearningModuleRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let mut modules = state.modules.list();
    modules.sort_by(|a, b| a.title.cmp(&b.title));
    Ok(Json(modules))
}

/// POST /api/modules: Add a module to the catalogue.
#[utoipa::path(
    post,
    path = "/api/modules",
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Module created", body = LearningModuleRecord),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
pub async fn create_module(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateModuleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LearningModuleRecord>), AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let req = extract_validated_json(body)?;

    let now = Utc::now();
    let record = LearningModuleRecord {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        description: req.description.map(|d| d.trim().to_string()),
        objectives: req.objectives,
        prerequisites: req.prerequisites,
        estimated_duration: req.estimated_duration.unwrap_or(DEFAULT_ESTIMATED_DURATION),
        difficulty_level: req.difficulty_level,
        created_at: now,
        updated_at: now,
    };
    state.modules.insert(record.id, record.clone());
    tracing::info!(module_id = %record.id, by = %caller.user_id, "learning module created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/modules/{id}: Get one module.
#[utoipa::path(
    get,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Module found", body = LearningModuleRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
pub async fn get_module(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LearningModuleRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    state
        .modules
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// PUT /api/modules/{id}: Update a module.
#[utoipa::path(
    put,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "Module ID")),
    request_body = UpdateModuleRequest,
    responses(
        (status = 200, description = "Module updated", body = LearningModuleRecord),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
pub async fn update_module(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateModuleRequest>, JsonRejection>,
) -> Result<Json<LearningModuleRecord>, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    state
        .modules
        .update(&id, |m| {
            if let Some(v) = req.title {
                m.title = v.trim().to_string();
            }
            if let Some(v) = req.description {
                m.description = Some(v.trim().to_string());
            }
            if req.objectives.is_some() {
                m.objectives = req.objectives;
            }
            if req.prerequisites.is_some() {
                m.prerequisites = req.prerequisites;
            }
            if let Some(v) = req.estimated_duration {
                m.estimated_duration = v;
            }
            if let Some(v) = req.difficulty_level {
                m.difficulty_level = v;
            }
            m.updated_at = now;
        })
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// DELETE /api/modules/{id}: Remove a module from the catalogue.
#[utoipa::path(
    delete,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "Module ID")),
    responses(
        (status = 204, description = "Module deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
pub async fn delete_module(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    state
        .modules
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    tracing::info!(module_id = %id, by = %caller.user_id, "learning module deleted");
    Ok(StatusCode::NO_CONTENT)
}
