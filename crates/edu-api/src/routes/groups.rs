//! # Groups API
//!
//! Class groups and the join rows that place students and teachers in
//! them. A student or teacher appears at most once per group; the pair is
//! enforced as a compound key on insert.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use edu_core::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, optional_text, require_text, Validate};
use crate::records::{
    GroupRecord, GroupStatus, MembershipStatus, StudentGroupRecord, StudentRecord,
    TeacherGroupRecord, TeacherRecord, TeachingRole,
};
use crate::state::AppState;

pub(crate) const READ_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const ROSTER_ROLES: &[Role] = &[Role::Teacher, Role::Admin];
pub(crate) const WRITE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Group not found";

/// Seats in a group when the request does not say.
const DEFAULT_CAPACITY: u32 = 20;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub status: GroupStatus,
}

impl Validate for CreateGroupRequest {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")?;
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err("end_date must not be before start_date".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub capacity: Option<u32>,
    pub status: Option<GroupStatus>,
}

impl Validate for UpdateGroupRequest {
    fn validate(&self) -> Result<(), String> {
        optional_text(self.name.as_deref(), "name")
    }
}

/// Add a student to a group.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddStudentRequest {
    pub student_id: Uuid,
    pub join_date: Option<DateTime<Utc>>,
}

impl Validate for AddStudentRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Assign a teacher to a group.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddTeacherRequest {
    pub teacher_id: Uuid,
    #[serde(default)]
    pub role: TeachingRole,
    pub start_date: Option<DateTime<Utc>>,
}

impl Validate for AddTeacherRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A student on a group's roster.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupStudent {
    pub membership: StudentGroupRecord,
    pub student: StudentRecord,
}

/// A teacher assigned to a group.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupTeacher {
    pub assignment: TeacherGroupRecord,
    pub teacher: TeacherRecord,
}

/// Build the groups router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/groups", get(list_groups).post(create_group))
        .route(
            "/api/groups/{id}",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route(
            "/api/groups/{id}/students",
            get(list_group_students).post(add_group_student),
        )
        .route(
            "/api/groups/{id}/students/{student_id}",
            delete(remove_group_student),
        )
        .route(
            "/api/groups/{id}/teachers",
            get(list_group_teachers).post(add_group_teacher),
        )
        .route(
            "/api/groups/{id}/teachers/{teacher_id}",
            delete(remove_group_teacher),
        )
}

fn require_group(state: &AppState, id: Uuid) -> Result<GroupRecord, AppError> {
    state
        .groups
        .get(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// GET /api/groups: List groups.
#[utoipa::path(
    get,
    path = "/api/groups",
    responses((status = 200, description = "Groups", body = Vec<GroupRecord>)),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn list_groups(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<GroupRecord>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let mut groups = state.groups.list();
    groups.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.name.cmp(&b.name)));
    Ok(Json(groups))
}

/// POST /api/groups: Create a group.
#[utoipa::path(
    post,
    path = "/api/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupRecord),
        (status = 403, description = "Role not permitted", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn create_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GroupRecord>), AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    let record = GroupRecord {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        description: req.description,
        start_date: req.start_date,
        end_date: req.end_date,
        capacity: req.capacity.unwrap_or(DEFAULT_CAPACITY),
        status: req.status,
        created_at: now,
        updated_at: now,
    };
    state.groups.insert(record.id, record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/groups/{id}: Get one group.
#[utoipa::path(
    get,
    path = "/api/groups/{id}",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group found", body = GroupRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn get_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<GroupRecord>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    require_group(&state, id).map(Json)
}

/// PUT /api/groups/{id}: Update a group.
#[utoipa::path(
    put,
    path = "/api/groups/{id}",
    params(("id" = Uuid, Path, description = "Group ID")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated", body = GroupRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn update_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateGroupRequest>, JsonRejection>,
) -> Result<Json<GroupRecord>, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    state
        .groups
        .try_update(&id, |g| {
            let start = req.start_date.unwrap_or(g.start_date);
            let end = req.end_date.or(g.end_date);
            if end.is_some_and(|end| end < start) {
                return Err(AppError::Validation(
                    "end_date must not be before start_date".into(),
                ));
            }
            if let Some(v) = req.name {
                g.name = v.trim().to_string();
            }
            if req.description.is_some() {
                g.description = req.description;
            }
            g.start_date = start;
            g.end_date = end;
            if let Some(v) = req.capacity {
                g.capacity = v;
            }
            if let Some(v) = req.status {
                g.status = v;
            }
            g.updated_at = now;
            Ok(g.clone())
        })
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?
        .map(Json)
}

/// DELETE /api/groups/{id}: Delete a group and its membership rows.
#[utoipa::path(
    delete,
    path = "/api/groups/{id}",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn delete_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    state
        .groups
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    state.student_groups.remove_where(|m| m.group_id == id);
    state.teacher_groups.remove_where(|m| m.group_id == id);
    tracing::info!(group_id = %id, by = %caller.user_id, "group deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/groups/{id}/students: The group's roster.
#[utoipa::path(
    get,
    path = "/api/groups/{id}/students",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Roster", body = Vec<GroupStudent>),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn list_group_students(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<GroupStudent>>, AppError> {
    require_roles(&caller, ROSTER_ROLES)?;
    let id = extract_path(id)?;
    require_group(&state, id)?;
    let mut roster: Vec<GroupStudent> = state
        .student_groups
        .filter(|m| m.group_id == id)
        .into_iter()
        .filter_map(|membership| {
            state.students.get(&membership.student_id).map(|student| GroupStudent {
                membership,
                student,
            })
        })
        .collect();
    roster.sort_by(|a, b| {
        (&a.student.last_name, &a.student.first_name)
            .cmp(&(&b.student.last_name, &b.student.first_name))
    });
    Ok(Json(roster))
}

/// POST /api/groups/{id}/students: Add a student to the group.
#[utoipa::path(
    post,
    path = "/api/groups/{id}/students",
    params(("id" = Uuid, Path, description = "Group ID")),
    request_body = AddStudentRequest,
    responses(
        (status = 201, description = "Student added", body = StudentGroupRecord),
        (status = 400, description = "Already a member", body = crate::error::ErrorBody),
        (status = 404, description = "Group or student not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn add_group_student(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AddStudentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StudentGroupRecord>), AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    require_group(&state, id)?;
    if !state.students.contains(&req.student_id) {
        return Err(AppError::NotFound("Student not found".into()));
    }

    let now = Utc::now();
    let record = StudentGroupRecord {
        id: Uuid::new_v4(),
        student_id: req.student_id,
        group_id: id,
        join_date: req.join_date.unwrap_or(now),
        exit_date: None,
        status: MembershipStatus::Active,
        created_at: now,
        updated_at: now,
    };
    state
        .student_groups
        .insert_unique(record.id, record.clone(), |m| (m.student_id, m.group_id))
        .map_err(|_| AppError::AlreadyExists("Student is already a member of this group".into()))?;
    if !state.groups.contains(&id) {
        state.student_groups.remove(&record.id);
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /api/groups/{id}/students/{student_id}: Remove a student from the group.
#[utoipa::path(
    delete,
    path = "/api/groups/{id}/students/{student_id}",
    params(
        ("id" = Uuid, Path, description = "Group ID"),
        ("student_id" = Uuid, Path, description = "Student ID"),
    ),
    responses(
        (status = 204, description = "Student removed"),
        (status = 404, description = "Not a member", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn remove_group_student(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let (id, student_id) = extract_path(ids)?;
    let row = state
        .student_groups
        .find(|m| m.group_id == id && m.student_id == student_id)
        .ok_or_else(|| AppError::NotFound("Student is not a member of this group".into()))?;
    state.student_groups.remove(&row.id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/groups/{id}/teachers: Teachers assigned to the group.
#[utoipa::path(
    get,
    path = "/api/groups/{id}/teachers",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Assigned teachers", body = Vec<GroupTeacher>),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn list_group_teachers(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<GroupTeacher>>, AppError> {
    require_roles(&caller, READ_ROLES)?;
    let id = extract_path(id)?;
    require_group(&state, id)?;
    let mut teachers: Vec<GroupTeacher> = state
        .teacher_groups
        .filter(|m| m.group_id == id)
        .into_iter()
        .filter_map(|assignment| {
            state.teachers.get(&assignment.teacher_id).map(|teacher| GroupTeacher {
                assignment,
                teacher,
            })
        })
        .collect();
    teachers.sort_by_key(|t| t.assignment.start_date);
    Ok(Json(teachers))
}

/// POST /api/groups/{id}/teachers: Assign a teacher to the group.
#[utoipa::path(
    post,
    path = "/api/groups/{id}/teachers",
    params(("id" = Uuid, Path, description = "Group ID")),
    request_body = AddTeacherRequest,
    responses(
        (status = 201, description = "Teacher assigned", body = TeacherGroupRecord),
        (status = 400, description = "Already assigned", body = crate::error::ErrorBody),
        (status = 404, description = "Group or teacher not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn add_group_teacher(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AddTeacherRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeacherGroupRecord>), AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    require_group(&state, id)?;
    if !state.teachers.contains(&req.teacher_id) {
        return Err(AppError::NotFound("Teacher not found".into()));
    }

    let now = Utc::now();
    let record = TeacherGroupRecord {
        id: Uuid::new_v4(),
        teacher_id: req.teacher_id,
        group_id: id,
        role: req.role,
        start_date: req.start_date.unwrap_or(now),
        end_date: None,
        created_at: now,
        updated_at: now,
    };
    state
        .teacher_groups
        .insert_unique(record.id, record.clone(), |m| (m.teacher_id, m.group_id))
        .map_err(|_| AppError::AlreadyExists("Teacher is already assigned to this group".into()))?;
    if !state.groups.contains(&id) {
        state.teacher_groups.remove(&record.id);
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /api/groups/{id}/teachers/{teacher_id}: Unassign a teacher.
#[utoipa::path(
    delete,
    path = "/api/groups/{id}/teachers/{teacher_id}",
    params(
        ("id" = Uuid, Path, description = "Group ID"),
        ("teacher_id" = Uuid, Path, description = "Teacher ID"),
    ),
    responses(
        (status = 204, description = "Teacher unassigned"),
        (status = 404, description = "Not assigned", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn remove_group_teacher(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, WRITE_ROLES)?;
    let (id, teacher_id) = extract_path(ids)?;
    let row = state
        .teacher_groups
        .find(|m| m.group_id == id && m.teacher_id == teacher_id)
        .ok_or_else(|| AppError::NotFound("Teacher is not assigned to this group".into()))?;
    state.teacher_groups.remove(&row.id);
    Ok(StatusCode::NO_CONTENT)
}
