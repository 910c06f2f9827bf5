//! # Resource Records
//!
//! Persisted shapes for every collection the API serves. Field names are
//! snake_case on the wire. Foreign keys are plain UUIDs; the referenced
//! collection is named in each field's doc.
//!
//! The credential record is the only type here that is never serialized:
//! it carries the password hash.

use chrono::{DateTime, NaiveDate, Utc};
use edu_core::{Email, ProfileId, Role, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// -- Credentials ---------------------------------------------------------------

/// Login credential bound to at most one role profile.
///
/// Custom `Debug` redacts the password hash.
#[derive(Clone)]
pub struct CredentialRecord {
    pub id: UserId,
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    /// `None` for admins.
    pub profile_id: Option<ProfileId>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("profile_id", &self.profile_id)
            .field("is_active", &self.is_active)
            .field("last_login", &self.last_login)
            .finish()
    }
}

// -- Profile status ------------------------------------------------------------

/// Enrollment status of a student.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Graduated,
    #[serde(rename = "On Leave")]
    OnLeave,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Graduated => "Graduated",
            Self::OnLeave => "On Leave",
        }
    }
}

/// Employment status shared by teachers and volunteers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
    #[serde(rename = "On Leave")]
    OnLeave,
}

impl StaffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::OnLeave => "On Leave",
        }
    }
}

// -- Role profiles -------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String)]
    pub email: Email,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub enrollment_date: DateTime<Utc>,
    pub status: StudentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String)]
    pub email: Email,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub hire_date: DateTime<Utc>,
    pub status: StaffStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VolunteerRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String)]
    pub email: Email,
    pub phone: Option<String>,
    pub status: StaffStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Groups and membership -----------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GroupStatus {
    #[default]
    Active,
    Inactive,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub capacity: u32,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a student's membership in a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MembershipStatus {
    #[default]
    Active,
    Inactive,
    Completed,
}

/// Student-in-group join row. Unique per (student, group).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentGroupRecord {
    pub id: Uuid,
    /// Student profile.
    pub student_id: Uuid,
    /// Group.
    pub group_id: Uuid,
    pub join_date: DateTime<Utc>,
    pub exit_date: Option<DateTime<Utc>>,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A teacher's function within a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TeachingRole {
    #[default]
    Primary,
    Assistant,
    Substitute,
}

/// Teacher-in-group join row. Unique per (teacher, group).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherGroupRecord {
    pub id: Uuid,
    /// Teacher profile.
    pub teacher_id: Uuid,
    /// Group.
    pub group_id: Uuid,
    pub role: TeachingRole,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Learning modules ----------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DifficultyLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// Hours a module takes when it does not say otherwise.
pub const DEFAULT_ESTIMATED_DURATION: f64 = 1.0;

/// Catalogue entry referenced by lessons, assignments and progress rows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LearningModuleRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub prerequisites: Option<String>,
    /// Hours.
    pub estimated_duration: f64,
    pub difficulty_level: DifficultyLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Lessons -------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LessonStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Group.
    pub group_id: Uuid,
    /// Teacher profile.
    pub teacher_id: Uuid,
    pub date: NaiveDate,
    /// Wall-clock start, e.g. `"09:00"`.
    pub start_time: String,
    pub end_time: String,
    /// Learning module, if the lesson follows one.
    pub module_id: Option<Uuid>,
    pub notes: Option<String>,
    pub status: LessonStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Assignments ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SubmissionType {
    #[default]
    Text,
    File,
    Link,
    Multiple,
}

/// Points awarded when an assignment does not say otherwise.
pub const DEFAULT_POINTS_POSSIBLE: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignmentRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub module_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub due_date: DateTime<Utc>,
    pub points_possible: f64,
    pub submission_type: SubmissionType,
    /// Teacher profile that owns the assignment.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssignmentRecord {
    /// The profile recorded as this assignment's owner.
    pub fn owner(&self) -> ProfileId {
        ProfileId::from(self.created_by)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SubmissionStatus {
    #[default]
    Submitted,
    Late,
    Graded,
    Returned,
}

/// A student's answer to an assignment. Unique per (assignment, student).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub assignment_id: Uuid,
    /// Student profile.
    pub student_id: Uuid,
    pub submission_date: DateTime<Utc>,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    /// Teacher profile that graded, or `None` when graded by an admin.
    pub graded_by: Option<Uuid>,
    pub graded_date: Option<DateTime<Utc>>,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Attendance ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Excused,
}

/// Attendance of one student at one lesson. Unique per (lesson, student).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub lesson_id: Uuid,
    /// Student profile.
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Progress ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ProgressStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Deferred,
}

/// Inclusive bounds of an assessment score.
pub const SCORE_RANGE: (f64, f64) = (0.0, 100.0);

/// A student's progress through one learning module. Unique per (student, module).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressRecord {
    pub id: Uuid,
    /// Student profile.
    pub student_id: Uuid,
    /// Learning module.
    pub module_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: ProgressStatus,
    pub assessment_score: Option<f64>,
    pub assessment_date: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_with_spaces_roundtrip_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&StudentStatus::OnLeave).unwrap(),
            "\"On Leave\""
        );
        assert_eq!(
            serde_json::from_str::<ProgressStatus>("\"In Progress\"").unwrap(),
            ProgressStatus::InProgress
        );
        assert_eq!(
            serde_json::to_string(&ProgressStatus::default()).unwrap(),
            "\"Not Started\""
        );
    }

    #[test]
    fn as_str_matches_serialized_form() {
        for status in [
            StudentStatus::Active,
            StudentStatus::Inactive,
            StudentStatus::Graduated,
            StudentStatus::OnLeave,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for status in [StaffStatus::Active, StaffStatus::Inactive, StaffStatus::OnLeave] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn credential_debug_redacts_hash() {
        let now = Utc::now();
        let record = CredentialRecord {
            id: UserId::new(),
            email: Email::parse("a@x.com").unwrap(),
            password_hash: "$argon2id$v=19$secret-material".into(),
            role: Role::Student,
            profile_id: Some(ProfileId::new()),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("secret-material"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn unknown_enum_value_rejected() {
        assert!(serde_json::from_str::<AttendanceStatus>("\"Sleeping\"").is_err());
    }
}
