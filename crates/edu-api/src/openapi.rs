//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served unauthenticated at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme referenced by protected routes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by /api/auth/register or /api/auth/login.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Education Management API",
        version = "0.1.0",
        description = "Role-gated API for a language school: students, teachers, groups, learning modules, lessons, assignments, attendance and progress.\n\nAuthentication: Bearer token via `Authorization: Bearer <token>` header. Register and login are public, as are the health probes and this document. Every other route names the roles it admits; assignment mutations additionally require the owning teacher or an admin."
    ),
    paths(
        // ── Auth ────────────────────────────────────────────────────────
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::me,
        crate::routes::auth::change_password,
        // ── Students ────────────────────────────────────────────────────
        crate::routes::students::list_students,
        crate::routes::students::create_student,
        crate::routes::students::get_student,
        crate::routes::students::update_student,
        crate::routes::students::delete_student,
        // ── Teachers ────────────────────────────────────────────────────
        crate::routes::teachers::list_teachers,
        crate::routes::teachers::create_teacher,
        crate::routes::teachers::get_teacher,
        crate::routes::teachers::update_teacher,
        crate::routes::teachers::delete_teacher,
        // ── Groups ──────────────────────────────────────────────────────
        crate::routes::groups::list_groups,
        crate::routes::groups::create_group,
        crate::routes::groups::get_group,
        crate::routes::groups::update_group,
        crate::routes::groups::delete_group,
        crate::routes::groups::list_group_students,
        crate::routes::groups::add_group_student,
        crate::routes::groups::remove_group_student,
        crate::routes::groups::list_group_teachers,
        crate::routes::groups::add_group_teacher,
        crate::routes::groups::remove_group_teacher,
        // ── Lessons ─────────────────────────────────────────────────────
        crate::routes::modules::list_modules,
        crate::routes::modules::create_module,
        crate::routes::modules::get_module,
        crate::routes::modules::update_module,
        crate::routes::modules::delete_module,
        crate::routes::lessons::list_lessons,
        crate::routes::lessons::list_group_lessons,
        crate::routes::lessons::list_teacher_lessons,
        crate::routes::lessons::create_lesson,
        crate::routes::lessons::get_lesson,
        crate::routes::lessons::update_lesson,
        crate::routes::lessons::delete_lesson,
        // ── Assignments ─────────────────────────────────────────────────
        crate::routes::assignments::list_assignments,
        crate::routes::assignments::list_group_assignments,
        crate::routes::assignments::create_assignment,
        crate::routes::assignments::get_assignment,
        crate::routes::assignments::update_assignment,
        crate::routes::assignments::delete_assignment,
        crate::routes::assignments::list_submissions,
        crate::routes::assignments::submit_assignment,
        crate::routes::assignments::grade_submission,
        // ── Attendance ──────────────────────────────────────────────────
        crate::routes::attendance::list_attendance,
        crate::routes::attendance::list_lesson_attendance,
        crate::routes::attendance::list_student_attendance,
        crate::routes::attendance::create_attendance,
        crate::routes::attendance::create_group_attendance,
        crate::routes::attendance::get_attendance,
        crate::routes::attendance::update_attendance,
        crate::routes::attendance::delete_attendance,
        // ── Progress ────────────────────────────────────────────────────
        crate::routes::progress::list_progress,
        crate::routes::progress::list_student_progress,
        crate::routes::progress::list_module_progress,
        crate::routes::progress::create_progress,
        crate::routes::progress::get_progress,
        crate::routes::progress::update_progress,
        crate::routes::progress::delete_progress,
    ),
    components(
        schemas(
            // ── Records ─────────────────────────────────────────────────
            crate::records::StudentRecord,
            crate::records::StudentStatus,
            crate::records::TeacherRecord,
            crate::records::StaffStatus,
            crate::records::GroupRecord,
            crate::records::GroupStatus,
            crate::records::StudentGroupRecord,
            crate::records::MembershipStatus,
            crate::records::TeacherGroupRecord,
            crate::records::TeachingRole,
            crate::records::LearningModuleRecord,
            crate::records::DifficultyLevel,
            crate::records::LessonRecord,
            crate::records::LessonStatus,
            crate::records::AssignmentRecord,
            crate::records::SubmissionType,
            crate::records::SubmissionRecord,
            crate::records::SubmissionStatus,
            crate::records::AttendanceRecord,
            crate::records::AttendanceStatus,
            crate::records::ProgressRecord,
            crate::records::ProgressStatus,
            // ── Error types ─────────────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Auth DTOs ───────────────────────────────────────────────
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::ChangePasswordRequest,
            crate::routes::auth::UserSummary,
            crate::routes::auth::SessionResponse,
            crate::routes::auth::MeResponse,
            crate::routes::auth::MessageResponse,
            // ── Resource DTOs ───────────────────────────────────────────
            crate::routes::students::CreateStudentRequest,
            crate::routes::students::UpdateStudentRequest,
            crate::routes::teachers::CreateTeacherRequest,
            crate::routes::teachers::UpdateTeacherRequest,
            crate::routes::groups::CreateGroupRequest,
            crate::routes::groups::UpdateGroupRequest,
            crate::routes::groups::AddStudentRequest,
            crate::routes::groups::AddTeacherRequest,
            crate::routes::groups::GroupStudent,
            crate::routes::groups::GroupTeacher,
            crate::routes::modules::CreateModuleRequest,
            crate::routes::modules::UpdateModuleRequest,
            crate::routes::lessons::CreateLessonRequest,
            crate::routes::lessons::UpdateLessonRequest,
            crate::routes::assignments::CreateAssignmentRequest,
            crate::routes::assignments::UpdateAssignmentRequest,
            crate::routes::assignments::SubmitAssignmentRequest,
            crate::routes::assignments::GradeSubmissionRequest,
            crate::routes::attendance::CreateAttendanceRequest,
            crate::routes::attendance::UpdateAttendanceRequest,
            crate::routes::attendance::GroupAttendanceRequest,
            crate::routes::progress::CreateProgressRequest,
            crate::routes::progress::UpdateProgressRequest,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login, current identity and password change"),
        (name = "students", description = "Student profiles"),
        (name = "teachers", description = "Teacher profiles"),
        (name = "groups", description = "Groups and their student and teacher membership"),
        (name = "modules", description = "Learning-module catalogue"),
        (name = "lessons", description = "Scheduled lessons"),
        (name = "assignments", description = "Assignments, submissions and grading"),
        (name = "attendance", description = "Lesson attendance"),
        (name = "progress", description = "Per-module student progress"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
