//! # Assignments API
//!
//! Assignments belong to the teacher profile that created them. Updating or
//! deleting an assignment, and grading any of its submissions, needs the
//! owning teacher or an admin on top of the route's role set.
//!
//! Students submit once per assignment; the (assignment, student) pair is a
//! compound key. A submission made after the due date is recorded as `Late`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use edu_core::Role;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_owner, require_roles, Caller};
use crate::error::{AppError, NOT_AUTHORIZED};
use crate::extractors::{
    extract_path, extract_validated_json, optional_text, require_range, require_text, Validate,
};
use crate::records::{
    AssignmentRecord, SubmissionRecord, SubmissionStatus, SubmissionType,
    DEFAULT_POINTS_POSSIBLE,
};
use crate::routes::modules::require_module;
use crate::state::AppState;

pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const STAFF_ROLES: &[Role] = &[Role::Teacher, Role::Admin];
pub(crate) const SUBMIT_ROLES: &[Role] = &[Role::Student];

const NOT_FOUND: &str = "Assignment not found";
const SUBMISSION_NOT_FOUND: &str = "Submission not found";

fn check_points(points: f64) -> Result<(), String> {
    if points.is_finite() && points > 0.0 {
        Ok(())
    } else {
        Err("points_possible must be greater than 0".into())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssignmentRequest {
    pub title: String,
    pub description: Option<String>,
    pub module_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub due_date: DateTime<Utc>,
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub submission_type: SubmissionType,
    /// Owning teacher profile. Required when an admin creates the
    /// assignment; ignored for teachers, who always own what they create.
    pub created_by: Option<Uuid>,
}

impl Validate for CreateAssignmentRequest {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.title, "title")?;
        if let Some(points) = self.points_possible {
            check_points(points)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAssignmentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub module_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub points_possible: Option<f64>,
    pub submission_type: Option<SubmissionType>,
}

impl Validate for UpdateAssignmentRequest {
    fn validate(&self) -> Result<(), String> {
        optional_text(self.title.as_deref(), "title")?;
        if let Some(points) = self.points_possible {
            check_points(points)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubmitAssignmentRequest {
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub url: Option<String>,
}

impl Validate for SubmitAssignmentRequest {
    fn validate(&self) -> Result<(), String> {
        let filled = [&self.content, &self.file_path, &self.url]
            .into_iter()
            .flatten()
            .any(|v| !v.trim().is_empty());
        if filled {
            Ok(())
        } else {
            Err("a submission needs content, a file_path or a url".into())
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GradeSubmissionRequest {
    pub grade: f64,
    pub feedback: Option<String>,
}

impl Validate for GradeSubmissionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.grade.is_finite() && self.grade >= 0.0 {
            Ok(())
        } else {
            Err("grade must not be negative".into())
        }
    }
}

/// Build the assignments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/assignments", get(list_assignments).post(create_assignment))
        .route("/api/assignments/group/{group_id}", get(list_group_assignments))
        .route(
            "/api/assignments/submissions/{id}/grade",
            put(grade_submission),
        )
        .route(
            "/api/assignments/{id}",
            get(get_assignment)
                .put(update_assignment)
                .delete(delete_assignment),
        )
        .route(
            "/api/assignments/{id}/submissions",
            get(list_submissions).post(submit_assignment),
        )
}

fn require_assignment(state: &AppState, id: Uuid) -> Result<AssignmentRecord, AppError> {
    state
        .assignments
        .get(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

fn by_due_date(mut assignments: Vec<AssignmentRecord>) -> Vec<AssignmentRecord> {
    assignments.sort_by_key(|a| a.due_date);
    assignments
}

/// GET /api/assignments: List assignments.
#[utoipa::path(
    get,
    path = "/api/assignments",
    responses((status = 200, description = "Assignments", body = Vec<AssignmentRecord>)),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<AssignmentRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    Ok(Json(by_due_date(state.assignments.list())))
}

/// GET /api/assignments/group/{group_id}: Assignments set for one group.
#[utoipa::path(
    get,
    path = "/api/assignments/group/{group_id}",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses((status = 200, description = "Assignments", body = Vec<AssignmentRecord>)),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn list_group_assignments(
    State(state): State<AppState>,
    Caller(caller): Caller,
    group_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<AssignmentRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let group_id = extract_path(group_id)?;
    Ok(Json(by_due_date(
        state.assignments.filter(|a| a.group_id == Some(group_id)),
    )))
}

/// POST /api/assignments: Create an assignment.
#[utoipa::path(
    post,
    path = "/api/assignments",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentRecord),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorBody),
        (status = 404, description = "Group or teacher not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn create_assignment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateAssignmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AssignmentRecord>), AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let req = extract_validated_json(body)?;

    let created_by = match (caller.role, caller.profile_id) {
        (Role::Teacher, Some(profile)) => *profile.as_uuid(),
        (Role::Admin, _) => req
            .created_by
            .ok_or_else(|| AppError::Validation("created_by is required".into()))?,
        _ => return Err(AppError::Forbidden(NOT_AUTHORIZED.into())),
    };
    if !state.teachers.contains(&created_by) {
        return Err(AppError::NotFound("Teacher not found".into()));
    }
    if let Some(group_id) = req.group_id {
        if !state.groups.contains(&group_id) {
            return Err(AppError::NotFound("Group not found".into()));
        }
    }
    require_module(&state, req.module_id)?;

    let now = Utc::now();
    let record = AssignmentRecord {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        description: req.description,
        module_id: req.module_id,
        group_id: req.group_id,
        due_date: req.due_date,
        points_possible: req.points_possible.unwrap_or(DEFAULT_POINTS_POSSIBLE),
        submission_type: req.submission_type,
        created_by,
        created_at: now,
        updated_at: now,
    };
    state.assignments.insert(record.id, record.clone());
    tracing::info!(assignment_id = %record.id, owner = %created_by, "assignment created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/assignments/{id}: Get one assignment.
#[utoipa::path(
    get,
    path = "/api/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment found", body = AssignmentRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn get_assignment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AssignmentRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    require_assignment(&state, id).map(Json)
}

/// PUT /api/assignments/{id}: Update an assignment. Owner or admin only.
#[utoipa::path(
    put,
    path = "/api/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = UpdateAssignmentRequest,
    responses(
        (status = 200, description = "Assignment updated", body = AssignmentRecord),
        (status = 403, description = "Not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn update_assignment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateAssignmentRequest>, JsonRejection>,
) -> Result<Json<AssignmentRecord>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    let existing = require_assignment(&state, id)?;
    require_owner(&caller, existing.owner(), "update this assignment")?;
    let req = extract_validated_json(body)?;
    if let Some(group_id) = req.group_id {
        if !state.groups.contains(&group_id) {
            return Err(AppError::NotFound("Group not found".into()));
        }
    }
    require_module(&state, req.module_id)?;

    let now = Utc::now();
    state
        .assignments
        .update(&id, |a| {
            if let Some(v) = req.title {
                a.title = v.trim().to_string();
            }
            if req.description.is_some() {
                a.description = req.description;
            }
            if req.module_id.is_some() {
                a.module_id = req.module_id;
            }
            if req.group_id.is_some() {
                a.group_id = req.group_id;
            }
            if let Some(v) = req.due_date {
                a.due_date = v;
            }
            if let Some(v) = req.points_possible {
                a.points_possible = v;
            }
            if let Some(v) = req.submission_type {
                a.submission_type = v;
            }
            a.updated_at = now;
        })
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// DELETE /api/assignments/{id}: Delete an assignment and its submissions.
/// Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 403, description = "Not the owner", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    let existing = require_assignment(&state, id)?;
    require_owner(&caller, existing.owner(), "delete this assignment")?;

    // Parent first: a submit racing this delete either lands before the
    // sweep or sees the assignment gone and withdraws its insert.
    state.assignments.remove(&id);
    state.submissions.remove_where(|s| s.assignment_id == id);
    tracing::info!(assignment_id = %id, by = %caller.user_id, "assignment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/assignments/{id}/submissions: Submissions for an assignment.
#[utoipa::path(
    get,
    path = "/api/assignments/{id}/submissions",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Submissions", body = Vec<SubmissionRecord>),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<SubmissionRecord>>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    require_assignment(&state, id)?;
    let mut submissions = state.submissions.filter(|s| s.assignment_id == id);
    submissions.sort_by_key(|s| s.submission_date);
    Ok(Json(submissions))
}

/// POST /api/assignments/{id}/submissions: Submit an assignment as the
/// calling student.
#[utoipa::path(
    post,
    path = "/api/assignments/{id}/submissions",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = SubmitAssignmentRequest,
    responses(
        (status = 201, description = "Submission recorded", body = SubmissionRecord),
        (status = 400, description = "Already submitted", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn submit_assignment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SubmitAssignmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionRecord>), AppError> {
    require_roles(&caller, SUBMIT_ROLES)?;
    let id = extract_path(id)?;
    let student_id = caller
        .profile_id
        .map(|p| *p.as_uuid())
        .filter(|id| state.students.contains(id))
        .ok_or_else(|| AppError::NotFound("Student not found".into()))?;
    let assignment = require_assignment(&state, id)?;
    let req = extract_validated_json(body)?;

    let now = Utc::now();
    let status = if now > assignment.due_date {
        SubmissionStatus::Late
    } else {
        SubmissionStatus::Submitted
    };
    let record = SubmissionRecord {
        id: Uuid::new_v4(),
        assignment_id: id,
        student_id,
        submission_date: now,
        content: req.content,
        file_path: req.file_path,
        url: req.url,
        grade: None,
        feedback: None,
        graded_by: None,
        graded_date: None,
        status,
        created_at: now,
        updated_at: now,
    };
    state
        .submissions
        .insert_unique(record.id, record.clone(), |s| (s.assignment_id, s.student_id))
        .map_err(|_| AppError::AlreadyExists("You have already submitted this assignment".into()))?;
    if !state.assignments.contains(&id) {
        state.submissions.remove(&record.id);
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/assignments/submissions/{id}/grade: Grade a submission. The
/// parent assignment's owner or an admin only.
#[utoipa::path(
    put,
    path = "/api/assignments/submissions/{id}/grade",
    params(("id" = Uuid, Path, description = "Submission ID")),
    request_body = GradeSubmissionRequest,
    responses(
        (status = 200, description = "Submission graded", body = SubmissionRecord),
        (status = 400, description = "Grade out of range", body = crate::error::ErrorBody),
        (status = 403, description = "Not the assignment owner", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
pub async fn grade_submission(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<GradeSubmissionRequest>, JsonRejection>,
) -> Result<Json<SubmissionRecord>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    let submission = state
        .submissions
        .get(&id)
        .ok_or_else(|| AppError::NotFound(SUBMISSION_NOT_FOUND.into()))?;
    let assignment = require_assignment(&state, submission.assignment_id)?;
    require_owner(&caller, assignment.owner(), "grade this submission")?;
    let req = extract_validated_json(body)?;
    require_range(req.grade, "grade", 0.0, assignment.points_possible)
        .map_err(AppError::Validation)?;

    let now = Utc::now();
    let graded_by = match caller.role {
        Role::Teacher => caller.profile_id.map(|p| *p.as_uuid()),
        _ => None,
    };
    let graded = state
        .submissions
        .update(&id, |s| {
            s.grade = Some(req.grade);
            s.feedback = req.feedback;
            s.graded_by = graded_by;
            s.graded_date = Some(now);
            s.status = SubmissionStatus::Graded;
            s.updated_at = now;
        })
        .ok_or_else(|| AppError::NotFound(SUBMISSION_NOT_FOUND.into()))?;
    tracing::info!(submission_id = %id, by = %caller.user_id, grade = req.grade, "submission graded");
    Ok(Json(graded))
}
