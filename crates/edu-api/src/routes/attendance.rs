//! # Attendance API
//!
//! One attendance record per (lesson, student). Staff record attendance
//! individually or for a whole group at once; only admins delete.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveTime, Utc};
use edu_core::Role;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_roles, Caller};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, Validate};
use crate::records::{AttendanceRecord, AttendanceStatus, MembershipStatus};
use crate::state::AppState;

pub(crate) const STAFF_ROLES: &[Role] = &[Role::Teacher, Role::Admin];
pub(crate) const STUDENT_VIEW_ROLES: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
pub(crate) const DELETE_ROLES: &[Role] = &[Role::Admin];

const NOT_FOUND: &str = "Attendance record not found";
const DUPLICATE: &str = "Attendance record already exists for this student and lesson";

fn check_clock(value: Option<&str>, field: &str) -> Result<(), String> {
    match value {
        Some(v) => NaiveTime::parse_from_str(v.trim(), "%H:%M")
            .map(|_| ())
            .map_err(|_| format!("{field} must be a time in HH:MM form")),
        None => Ok(()),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAttendanceRequest {
    pub lesson_id: Uuid,
    pub student_id: Uuid,
    #[serde(default)]
    pub status: AttendanceStatus,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub notes: Option<String>,
}

impl Validate for CreateAttendanceRequest {
    fn validate(&self) -> Result<(), String> {
        check_clock(self.arrival_time.as_deref(), "arrival_time")?;
        check_clock(self.departure_time.as_deref(), "departure_time")
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAttendanceRequest {
    pub status: Option<AttendanceStatus>,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub notes: Option<String>,
}

impl Validate for UpdateAttendanceRequest {
    fn validate(&self) -> Result<(), String> {
        check_clock(self.arrival_time.as_deref(), "arrival_time")?;
        check_clock(self.departure_time.as_deref(), "departure_time")
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GroupAttendanceRequest {
    /// Status given to every created record.
    #[serde(default, alias = "defaultStatus")]
    pub default_status: AttendanceStatus,
}

/// Build the attendance router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", get(list_attendance).post(create_attendance))
        .route("/api/attendance/lesson/{lesson_id}", get(list_lesson_attendance))
        .route(
            "/api/attendance/lesson/{lesson_id}/group/{group_id}",
            post(create_group_attendance),
        )
        .route("/api/attendance/student/{student_id}", get(list_student_attendance))
        .route(
            "/api/attendance/{id}",
            get(get_attendance)
                .put(update_attendance)
                .delete(delete_attendance),
        )
}

fn require_lesson(state: &AppState, lesson_id: Uuid) -> Result<(), AppError> {
    if state.lessons.contains(&lesson_id) {
        Ok(())
    } else {
        Err(AppError::NotFound("Lesson not found".into()))
    }
}

/// GET /api/attendance: List all attendance records.
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses((status = 200, description = "Attendance records", body = Vec<AttendanceRecord>)),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn list_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let mut records = state.attendance.list();
    records.sort_by_key(|a| a.created_at);
    Ok(Json(records))
}

/// GET /api/attendance/lesson/{lesson_id}: Attendance taken at one lesson.
#[utoipa::path(
    get,
    path = "/api/attendance/lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson ID")),
    responses((status = 200, description = "Attendance records", body = Vec<AttendanceRecord>)),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn list_lesson_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    lesson_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let lesson_id = extract_path(lesson_id)?;
    Ok(Json(state.attendance.filter(|a| a.lesson_id == lesson_id)))
}

/// GET /api/attendance/student/{student_id}: One student's attendance history.
#[utoipa::path(
    get,
    path = "/api/attendance/student/{student_id}",
    params(("student_id" = Uuid, Path, description = "Student ID")),
    responses((status = 200, description = "Attendance records", body = Vec<AttendanceRecord>)),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn list_student_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    student_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    require_roles(&caller, STUDENT_VIEW_ROLES)?;
    let student_id = extract_path(student_id)?;
    Ok(Json(state.attendance.filter(|a| a.student_id == student_id)))
}

/// POST /api/attendance: Record one student's attendance at a lesson.
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = CreateAttendanceRequest,
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceRecord),
        (status = 400, description = "Already recorded", body = crate::error::ErrorBody),
        (status = 404, description = "Lesson or student not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn create_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateAttendanceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let req = extract_validated_json(body)?;
    require_lesson(&state, req.lesson_id)?;
    if !state.students.contains(&req.student_id) {
        return Err(AppError::NotFound("Student not found".into()));
    }

    let now = Utc::now();
    let record = AttendanceRecord {
        id: Uuid::new_v4(),
        lesson_id: req.lesson_id,
        student_id: req.student_id,
        status: req.status,
        arrival_time: trimmed(req.arrival_time),
        departure_time: trimmed(req.departure_time),
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };
    state
        .attendance
        .insert_unique(record.id, record.clone(), |a| (a.lesson_id, a.student_id))
        .map_err(|_| AppError::AlreadyExists(DUPLICATE.into()))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/attendance/lesson/{lesson_id}/group/{group_id}: Record
/// attendance for every active member of a group. Students who already have
/// a record for the lesson are skipped.
#[utoipa::path(
    post,
    path = "/api/attendance/lesson/{lesson_id}/group/{group_id}",
    params(
        ("lesson_id" = Uuid, Path, description = "Lesson ID"),
        ("group_id" = Uuid, Path, description = "Group ID"),
    ),
    request_body = GroupAttendanceRequest,
    responses(
        (status = 201, description = "Records created", body = Vec<AttendanceRecord>),
        (status = 404, description = "Lesson not found or no active members", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn create_group_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<AttendanceRecord>>), AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let (lesson_id, group_id) = extract_path(ids)?;
    // The body is optional here.
    let req: GroupAttendanceRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GroupAttendanceRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    require_lesson(&state, lesson_id)?;

    let members = state
        .student_groups
        .filter(|m| m.group_id == group_id && m.status == MembershipStatus::Active);
    if members.is_empty() {
        return Err(AppError::NotFound(
            "No active students found in this group".into(),
        ));
    }

    let now = Utc::now();
    let mut created = Vec::new();
    for member in members {
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            lesson_id,
            student_id: member.student_id,
            status: req.default_status,
            arrival_time: None,
            departure_time: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        if state
            .attendance
            .insert_unique(record.id, record.clone(), |a| (a.lesson_id, a.student_id))
            .is_ok()
        {
            created.push(record);
        }
    }
    tracing::info!(%lesson_id, %group_id, created = created.len(), "group attendance recorded");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/attendance/{id}: Get one attendance record.
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id" = Uuid, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn get_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AttendanceRecord>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    state
        .attendance
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// PUT /api/attendance/{id}: Update an attendance record.
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(("id" = Uuid, Path, description = "Attendance record ID")),
    request_body = UpdateAttendanceRequest,
    responses(
        (status = 200, description = "Attendance updated", body = AttendanceRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn update_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateAttendanceRequest>, JsonRejection>,
) -> Result<Json<AttendanceRecord>, AppError> {
    require_roles(&caller, STAFF_ROLES)?;
    let id = extract_path(id)?;
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    state
        .attendance
        .update(&id, |a| {
            if let Some(v) = req.status {
                a.status = v;
            }
            if req.arrival_time.is_some() {
                a.arrival_time = trimmed(req.arrival_time);
            }
            if req.departure_time.is_some() {
                a.departure_time = trimmed(req.departure_time);
            }
            if req.notes.is_some() {
                a.notes = req.notes;
            }
            a.updated_at = now;
        })
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// DELETE /api/attendance/{id}: Delete an attendance record.
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id" = Uuid, Path, description = "Attendance record ID")),
    responses(
        (status = 204, description = "Attendance deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "attendance"
)]
pub async fn delete_attendance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_roles(&caller, DELETE_ROLES)?;
    let id = extract_path(id)?;
    state
        .attendance
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{LessonRecord, StudentGroupRecord};
    use crate::test_support::{caller_app, seed_caller, send};

    fn seed_lesson(state: &AppState, group_id: Uuid) -> Uuid {
        let now = Utc::now();
        let lesson = LessonRecord {
            id: Uuid::new_v4(),
            title: "Numbers".into(),
            description: None,
            group_id,
            teacher_id: Uuid::new_v4(),
            date: now.date_naive(),
            start_time: "09:00".into(),
            end_time: "10:00".into(),
            module_id: None,
            notes: None,
            status: Default::default(),
            created_at: now,
            updated_at: now,
        };
        state.lessons.insert(lesson.id, lesson.clone());
        lesson.id
    }

    fn enrol(state: &AppState, student_id: Uuid, group_id: Uuid, status: MembershipStatus) {
        let now = Utc::now();
        let row = StudentGroupRecord {
            id: Uuid::new_v4(),
            student_id,
            group_id,
            join_date: now,
            exit_date: None,
            status,
            created_at: now,
            updated_at: now,
        };
        state.student_groups.insert(row.id, row);
    }

    #[tokio::test]
    async fn one_record_per_student_and_lesson() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        seed_caller(&state, Role::Student).await;
        let student = state.students.list()[0].id;
        let lesson = seed_lesson(&state, Uuid::new_v4());
        let body = serde_json::json!({"lesson_id": lesson, "student_id": student, "arrival_time": "09:05"});

        let (status, created) =
            send(&app, "POST", "/api/attendance", &teacher, Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Present");

        let (status, err) = send(&app, "POST", "/api/attendance", &teacher, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["message"], DUPLICATE);
    }

    #[tokio::test]
    async fn clock_times_are_stored_trimmed() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        seed_caller(&state, Role::Student).await;
        let student = state.students.list()[0].id;
        let lesson = seed_lesson(&state, Uuid::new_v4());
        let body = serde_json::json!({
            "lesson_id": lesson,
            "student_id": student,
            "arrival_time": " 09:05 "
        });

        let (status, created) = send(&app, "POST", "/api/attendance", &teacher, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["arrival_time"], "09:05");

        let id = created["id"].as_str().unwrap();
        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/attendance/{id}"),
            &teacher,
            Some(serde_json::json!({"departure_time": "10:30\t"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["departure_time"], "10:30");
        assert_eq!(updated["arrival_time"], "09:05");
    }

    #[tokio::test]
    async fn unknown_lesson_is_not_found() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let body = serde_json::json!({"lesson_id": Uuid::new_v4(), "student_id": Uuid::new_v4()});
        let (status, err) = send(&app, "POST", "/api/attendance", &teacher, Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"]["message"], "Lesson not found");
    }

    #[tokio::test]
    async fn group_attendance_covers_active_members_once() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let group = Uuid::new_v4();
        let lesson = seed_lesson(&state, group);
        let (a, b, gone) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        enrol(&state, a, group, MembershipStatus::Active);
        enrol(&state, b, group, MembershipStatus::Active);
        enrol(&state, gone, group, MembershipStatus::Inactive);
        let uri = format!("/api/attendance/lesson/{lesson}/group/{group}");

        let (status, created) = send(
            &app,
            "POST",
            &uri,
            &teacher,
            Some(serde_json::json!({"defaultStatus": "Absent"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created = created.as_array().unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|r| r["status"] == "Absent"));

        let (status, again) = send(&app, "POST", &uri, &teacher, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(again.as_array().unwrap().is_empty());
        assert_eq!(state.attendance.len(), 2);
    }

    #[tokio::test]
    async fn group_without_active_members_is_not_found() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let group = Uuid::new_v4();
        let lesson = seed_lesson(&state, group);
        let (status, err) = send(
            &app,
            "POST",
            &format!("/api/attendance/lesson/{lesson}/group/{group}"),
            &teacher,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"]["message"], "No active students found in this group");
    }

    #[tokio::test]
    async fn students_see_history_but_not_lesson_rolls() {
        let (app, state) = caller_app(router());
        let student = seed_caller(&state, Role::Student).await;
        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/attendance/student/{}", Uuid::new_v4()),
            &student,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/attendance/lesson/{}", Uuid::new_v4()),
            &student,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn teacher_cannot_delete_even_missing_records() {
        let (app, state) = caller_app(router());
        let teacher = seed_caller(&state, Role::Teacher).await;
        let admin = seed_caller(&state, Role::Admin).await;
        let uri = format!("/api/attendance/{}", Uuid::new_v4());
        let (status, _) = send(&app, "DELETE", &uri, &teacher, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, "DELETE", &uri, &admin, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
