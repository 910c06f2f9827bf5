//! # Lessons API
//!
//! Scheduled lessons for a group, taught by one teacher. Times are
//! wall-clock `HH:MM` strings; a lesson must end after it starts.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime, Utc};
use edu_core::{Principal, Role};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, optional_text, require_text, Validate};
use crate::records::{LessonRecord, LessonStatus};
use crate::routes::modules::require_module;
use crate::state::AppState;

pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const STAFF_ROLES: &[Role] = &[Role::Teacher, Role::Admin];
pub(crate) const DELETE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Lesson not found";

fn parse_time(value: &str, field: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| format!("{field} must be a time in HH:MM form"))
}

fn check_times(start: &str, end: &str) -> Result<(), String> {
    if parse_time(end, "end_time")? <= parse_time(start, "start_time")? {
        return Err("end_time must be after start_time".into());
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLessonRequest {
    pub title: String,
    pub description: Option<String>,
    pub group_id: Uuid,
    /// Defaults to the calling teacher's own profile.
    pub teacher_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub module_id: Option<Uuid>,
    pub notes: Option<String>,
    #[serde(default)]
    pub status: LessonStatus,
}

impl Validate for CreateLessonRequest {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.title, "title")?;
        check_times(&self.start_time, &self.end_time)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub group_id: Option<Uuid>,
    pub teacher_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub module_id: Option<Uuid>,
    pub notes: Option<String>,
    pub status: Option<LessonStatus>,
}

impl Validate for UpdateLessonRequest {
    fn validate(&self) -> Result<(), String> {
        optional_text(self.title.as_deref(), "title")?;
        if let Some(t) = &self.start_time {
            parse_time(t, "start_time")?;
        }
        if let Some(t) = &self.end_time {
            parse_time(t, "end_time")?;
        }
        Ok(())
    }
}

/// Build the lessons router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lessons", get(list_lessons).post(create_lesson))
        .route("/api/lessons/group/{group_id}", get(list_group_lessons))
        .route("/api/lessons/teacher/{teacher_id}", get(list_teacher_lessons))
        .route(
            "/api/lessons/{id}",
            get(get_lesson).put(update_lesson).delete(delete_lesson),
        )
}

fn chronological(mut lessons: Vec<LessonRecord>) -> Vec<LessonRecord> {
    lessons.sort_by(|a, b| (a.date, &a.start_time).cmp(&(b.date, &b.start_time)));
    lessons
}

/// Resolve the teacher for a new lesson: an explicit id, or the calling
/// teacher's own profile.
fn lesson_teacher(caller: &Principal, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    match (requested, caller.role, caller.profile_id) {
        (Some(id), _, _) => Ok(id),
        (None, Role::Teacher, Some(profile)) => Ok(*profile.as_uuid()),
        _ => Err(AppError::Validation("teacher_id is required".into())),
    }
}

fn check_references(state: &AppState, group_id: Uuid, teacher_id: Uuid) -> Result<(), AppError> {
    if !state.groups.contains(&group_id) {
        return Err(AppError::NotFound("Group not found".into()));
    }
    if !state.teachers.contains(&teacher_id) {
        return Err(AppError::NotFound("Teacher not found".into()));
    }
    Ok(())
}

/// GET /api/lessons: List lessons.
#[utoipa::path(
    get,
    path = "/api/lessons",
    responses((status = 200, description = "Lessons", body = Vec<LessonRecord>)),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<LessonRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    Ok(Json(chronological(state.lessons.list())))
}

/// GET /api/lessons/group/{group_id}: Lessons for one group.
#[utoipa::path(
    get,
    path = "/api/lessons/group/{group_id}",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses((status = 200, description = "Lessons", body = Vec<LessonRecord>)),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn list_group_lessons(
    State(state): State<AppState>,
    Caller(caller): Caller,
    group_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<LessonRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let group_id = extract_path(group_id)?;
    Ok(Json(chronological(
        state.lessons.filter(|l| l.group_id == group_id),
    )))
}

/// GET /api/lessons/teacher/{teacher_id}: Lessons taught by one teacher.
#[utoipa::path(
    get,
    path = "/api/lessons/teacher/{teacher_id}",
    params(("teacher_id" = Uuid, Path, description = "Teacher ID")),
    responses((status = 200, description = "Lessons", body = Vec<LessonRecord>)),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn list_teacher_lessons(
    State(state): State<AppState>,
    Caller(caller): Caller,
    teacher_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<LessonRecord>>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let teacher_id = extract_path(teacher_id)?;
    Ok(Json(chronological(
        state.lessons.filter(|l| l.teacher_id == teacher_id),
    )))
}

/// POST /api/lessons: Schedule a lesson.
#[utoipa::path(
    post,
    path = "/api/lessons",
    request_body = CreateLessonRequest,
    responses(
        (status = 201, description = "Lesson created", body = LessonRecord),
        (status = 404, description = "Group or teacher not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateLessonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LessonRecord>), AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let req = extract_validated_json(body)?;
    let teacher_id = lesson_teacher(&caller, req.teacher_id)?;
    check_references(&state, req.group_id, teacher_id)?;
    require_module(&state, req.module_id)?;

    let now = Utc::now();
    let record = LessonRecord {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        description: req.description,
        group_id: req.group_id,
        teacher_id,
        date: req.date,
        start_time: req.start_time.trim().to_string(),
        end_time: req.end_time.trim().to_string(),
        module_id: req.module_id,
        notes: req.notes,
        status: req.status,
        created_at: now,
        updated_at: now,
    };
    state.lessons.insert(record.id, record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/lessons/{id}: Get one lesson.
#[utoipa::path(
    get,
    path = "/api/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Lesson found", body = LessonRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn get_lesson(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LessonRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    state
        .lessons
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// PUT /api/lessons/{id}: Update a lesson.
#[utoipa::path(
    put,
    path = "/api/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson ID")),
    request_body = UpdateLessonRequest,
    responses(
        (status = 200, description = "Lesson updated", body = LessonRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn update_lesson(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateLessonRequest>, JsonRejection>,
) -> Result<Json<LessonRecord>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let existing = state
        .lessons
        .get(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

    let group_id = req.group_id.unwrap_or(existing.group_id);
    let teacher_id = req.teacher_id.unwrap_or(existing.teacher_id);
    if req.group_id.is_some() || req.teacher_id.is_some() {
        check_references(&state, group_id, teacher_id)?;
    }
    require_module(&state, req.module_id)?;

    let now = Utc::now();
    state
        .lessons
        .try_update(&id, |l| -> Result<LessonRecord, AppError> {
            let start = req.start_time.as_deref().unwrap_or(&l.start_time).trim().to_string();
            let end = req.end_time.as_deref().unwrap_or(&l.end_time).trim().to_string();
            check_times(&start, &end).map_err(AppError::Validation)?;
            if let Some(v) = req.title {
                l.title = v.trim().to_string();
            }
            if req.description.is_some() {
                l.description = req.description;
            }
            l.group_id = group_id;
            l.teacher_id = teacher_id;
            if let Some(v) = req.date {
                l.date = v;
            }
            l.start_time = start;
            l.end_time = end;
            if req.module_id.is_some() {
                l.module_id = req.module_id;
            }
            if req.notes.is_some() {
                l.notes = req.notes;
            }
            if let Some(v) = req.status {
                l.status = v;
            }
            l.updated_at = now;
            Ok(l.clone())
        })
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?
        .map(Json)
}

/// DELETE /api/lessons/{id}: Delete a lesson.
#[utoipa::path(
    delete,
    path = "/api/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, DELETE_ROLES)?;
    let id = extract_path(id)?;
    state
        .lessons
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::GroupRecord;
    use crate::test_support::{caller_app, seed_caller, seed_module, send};

    fn seed_group(state: &AppState) -> Uuid {
        let now = Utc::now();
        let group = GroupRecord {
            id: Uuid::new_v4(),
            name: "Evening B2".into(),
            description: None,
            start_date: now.date_naive(),
            end_date: None,
            capacity: 12,
            status: Default::default(),
            created_at: now,
            updated_at: now,
        };
        state.groups.insert(group.id, group.clone());
        group.id
    }

    fn lesson(group_id: Uuid, start: &str, end: &str) -> serde_json::Value {
        serde_json::json!({
            "title": "Past tense",
            "group_id": group_id,
            "date": "2025-10-01",
            "start_time": start,
            "end_time": end
        })
    }

    #[tokio::test]
    async fn teacher_creates_lesson_for_self() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let group = seed_group(&state);
        let teacher_profile = state.teachers.list()[0].id;

        let (status, body) =
            send(&app, "POST", "/api/lessons", &teacher, Some(lesson(group, "09:00", "10:30"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["teacher_id"], teacher_profile.to_string());
        assert_eq!(body["status"], "Scheduled");

        let (status, list) = send(
            &app,
            "GET",
            &format!("/api/lessons/teacher/{teacher_profile}"),
            &teacher,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lesson_module_must_exist() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let group = seed_group(&state);

        let mut body = lesson(group, "09:00", "10:00");
        body["module_id"] = serde_json::json!(Uuid::new_v4());
        let (status, err) = send(&app, "POST", "/api/lessons", &teacher, Some(body.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"]["message"], "Learning module not found");

        body["module_id"] = serde_json::json!(seed_module(&state));
        let (status, _) = send(&app, "POST", "/api/lessons", &teacher, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn admin_must_name_teacher() {
        let (app, state) = caller_app(router());
        let admin = seed_caller(&state, Role::Admin).await;
        let group = seed_group(&state);
        let (status, body) =
            send(&app, "POST", "/api/lessons", &admin, Some(lesson(group, "09:00", "10:00"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "teacher_id is required");
    }

    #[tokio::test]
    async fn end_before_start_is_rejected() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let group = seed_group(&state);
        let (status, _) =
            send(&app, "POST", "/api/lessons", &teacher, Some(lesson(group, "10:00", "09:00"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            send(&app, "POST", "/api/lessons", &teacher, Some(lesson(group, "9am", "10:00"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn student_reads_group_lessons_but_not_teacher_schedule() {
        let (app, state) = caller_app(router());
        let student = seed_caller(&state, Role::Student).await;
        let group = seed_group(&state);
        let (status, _) =
            send(&app, "GET", &format!("/api/lessons/group/{group}"), &student, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/lessons/teacher/{}", Uuid::new_v4()),
            &student,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn only_admin_deletes() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let admin = seed_caller(&state, Role::Admin).await;
        let group = seed_group(&state);
        let (_, created) =
            send(&app, "POST", "/api/lessons", &teacher, Some(lesson(group, "09:00", "10:00"))).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/lessons/{id}"),
            &teacher,
            Some(serde_json::json!({"status": "Completed", "end_time": "11:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["end_time"], "11:00");

        let (status, _) = send(&app, "DELETE", &format!("/api/lessons/{id}"), &teacher, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, "DELETE", &format!("/api/lessons/{id}"), &admin, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, "GET", &format!("/api/lessons/{id}"), &admin, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], NOT_FOUND);
    }
}
